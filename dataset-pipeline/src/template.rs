use common::{document::Chunk, error::AppError};
use minijinja::{Environment, UndefinedBehavior};
use serde_json::{Map, Value};

const TEMPLATE_NAME: &str = "content";

/// Per-chunk content template. The template sees `page_content` plus one
/// `meta_<key>` variable per metadata entry; referencing anything else fails
/// the chunk with a descriptive error (strict undefined lookups).
pub struct ContentTemplate {
    env: Environment<'static>,
}

impl ContentTemplate {
    pub fn new(source: &str) -> Result<Self, AppError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_template_owned(TEMPLATE_NAME.to_owned(), source.to_owned())?;
        Ok(Self { env })
    }

    pub fn render(&self, chunk: &Chunk) -> Result<String, AppError> {
        let mut context = Map::new();
        context.insert(
            "page_content".to_owned(),
            Value::String(chunk.page_content.clone()),
        );
        for (key, value) in &chunk.metadata {
            context.insert(format!("meta_{key}"), value.clone());
        }

        let template = self.env.get_template(TEMPLATE_NAME)?;
        Ok(template.render(minijinja::Value::from_serialize(&context))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_content_and_metadata_fields() {
        let template =
            ContentTemplate::new("{{ meta_title }}\n\n{{ page_content }}").expect("template");

        let mut chunk = Chunk::new("body text");
        chunk.insert_metadata("title", "A title");

        let rendered = template.render(&chunk).expect("render");
        assert_eq!(rendered, "A title\n\nbody text");
    }

    #[test]
    fn unknown_field_fails_the_chunk() {
        let template = ContentTemplate::new("{{ meta_absent }}").expect("template");

        let result = template.render(&Chunk::new("body"));
        assert!(matches!(result, Err(AppError::Template(_))));
    }

    #[test]
    fn malformed_template_fails_fast() {
        assert!(matches!(
            ContentTemplate::new("{{ unclosed"),
            Err(AppError::Template(_))
        ));
    }
}
