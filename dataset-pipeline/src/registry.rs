use std::collections::HashSet;
use std::sync::Arc;

use common::{
    error::AppError,
    utils::config::{DatasetConfig, IndexSetting, ProviderConfig},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    dataset::{Dataset, IndexMode},
    loaders::{
        cache::{CacheLoader, CacheLoaderParams},
        fs::{FsLoader, FsLoaderParams},
        list::{ListLoader, ListLoaderParams},
        url::{UrlLoader, UrlLoaderParams},
        DocumentLoader,
    },
    splitters::{CharacterSplitter, DocumentSplitter, MarkdownDocumentSplitter, SplitterParams},
    transformers::{
        html_to_text::{HtmlToTextParams, HtmlToTextTransformer},
        ChainedTransformer, DocumentTransformer,
    },
};

/// Decodes a provider's parameter bag into its typed parameter struct,
/// surfacing missing or mistyped fields before anything runs.
fn provider_params<T: DeserializeOwned>(kind: &str, config: &ProviderConfig) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(config.extra.clone())).map_err(|err| {
        AppError::Validation(format!(
            "invalid parameters for {kind} provider '{}': {err}",
            config.provider
        ))
    })
}

/// Static loader registry; unknown tags are rejected at startup.
pub fn build_loader(config: &ProviderConfig) -> Result<Arc<dyn DocumentLoader>, AppError> {
    match config.provider.as_str() {
        "fs" => {
            let params: FsLoaderParams = provider_params("loader", config)?;
            Ok(Arc::new(FsLoader::new(params)))
        }
        "cache" => {
            let params: CacheLoaderParams = provider_params("loader", config)?;
            Ok(Arc::new(CacheLoader::new(params)))
        }
        "url" => {
            let params: UrlLoaderParams = provider_params("loader", config)?;
            Ok(Arc::new(UrlLoader::new(params)?))
        }
        "list" => {
            let params: ListLoaderParams = provider_params("loader", config)?;
            Ok(Arc::new(ListLoader::new(params)))
        }
        other => Err(AppError::Validation(format!(
            "unknown loader provider '{other}', use one of 'fs', 'cache', 'url', 'list'"
        ))),
    }
}

pub fn build_transformer(config: &ProviderConfig) -> Result<Arc<dyn DocumentTransformer>, AppError> {
    match config.provider.as_str() {
        "html2text" => {
            let params: HtmlToTextParams = provider_params("transformer", config)?;
            Ok(Arc::new(HtmlToTextTransformer::new(params)?))
        }
        other => Err(AppError::Validation(format!(
            "unknown transformer provider '{other}', use 'html2text'"
        ))),
    }
}

pub fn build_splitter(config: &ProviderConfig) -> Result<Arc<dyn DocumentSplitter>, AppError> {
    match config.provider.as_str() {
        "characters" => {
            let params: SplitterParams = provider_params("splitter", config)?;
            Ok(Arc::new(CharacterSplitter::new(params)?))
        }
        "markdown" => {
            let params: SplitterParams = provider_params("splitter", config)?;
            Ok(Arc::new(MarkdownDocumentSplitter::new(params)?))
        }
        other => Err(AppError::Validation(format!(
            "unknown splitter provider '{other}', use 'characters' or 'markdown'"
        ))),
    }
}

/// Builds one dataset from its configuration entry.
pub fn build_dataset(config: &DatasetConfig) -> Result<Dataset, AppError> {
    config.index.validate(&config.id)?;

    let loader = build_loader(&config.loader)?;
    let mut dataset = Dataset::new(config.id.clone(), loader);

    if let Some(transformer) = &config.transformer {
        let specs = transformer.clone().into_vec();
        let stages = specs
            .iter()
            .map(build_transformer)
            .collect::<Result<Vec<_>, _>>()?;
        let transformer: Arc<dyn DocumentTransformer> = match stages.len() {
            1 => stages.into_iter().next().ok_or_else(|| {
                AppError::Validation(format!("empty transformer list in {} dataset", config.id))
            })?,
            _ => Arc::new(ChainedTransformer::new(stages)),
        };
        dataset = dataset.with_transformer(transformer);
    }

    if let Some(splitter) = &config.splitter {
        dataset = dataset.with_splitter(build_splitter(splitter)?);
    }

    if let Some(metadata) = &config.metadata {
        dataset = dataset.with_static_metadata(metadata.clone());
    }

    if let Some(template) = &config.text_template {
        dataset = dataset.with_template(template)?;
    }

    if let Some(output) = &config.output {
        dataset = dataset.with_output(output.folder(), output.varname());
    }

    dataset = match &config.index {
        IndexSetting::Enabled(false) => dataset.with_index_mode(IndexMode::Disabled),
        IndexSetting::Enabled(true) => dataset,
        IndexSetting::Mode(_) => dataset.with_index_mode(IndexMode::CacheOnly),
        IndexSetting::Settings(settings) => {
            let mut dataset = dataset
                .with_source_id_key(settings.source_id_key.clone())
                .with_cleanup(settings.cleanup);
            if let Some(name) = &settings.name {
                dataset = dataset.with_name(name.clone());
            }
            dataset
        }
    };

    Ok(dataset)
}

/// Builds every configured dataset, in order, rejecting duplicate ids.
pub fn build_datasets(configs: &[DatasetConfig]) -> Result<Vec<Dataset>, AppError> {
    let mut seen = HashSet::new();
    let mut datasets = Vec::with_capacity(configs.len());

    for config in configs {
        if !seen.insert(config.id.clone()) {
            return Err(AppError::Validation(format!(
                "duplicate dataset id '{}'",
                config.id
            )));
        }
        datasets.push(build_dataset(config)?);
    }

    Ok(datasets)
}
