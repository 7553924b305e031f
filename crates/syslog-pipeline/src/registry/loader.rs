//! 파서 설정 로더 -- 설정 문서 파일을 디스크에서 로드합니다.
//!
//! 디렉토리 내의 `.json`/`.yml`/`.yaml` 파일을 스캔하고 파싱합니다.
//! 파일 하나는 문서 하나 또는 문서 배열을 담습니다.
//! 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.

use std::path::Path;

use crate::error::SyslogPipelineError;

use super::document::ConfigDocument;

/// 설정 파일 로더 제한
const MAX_PARSER_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_DOCUMENT_COUNT: usize = 10_000;

/// 파서 설정 파일 로더
pub struct ParserConfigLoader;

impl ParserConfigLoader {
    /// 디렉토리에서 모든 설정 문서를 로드합니다.
    ///
    /// 문서는 파일 이름 순으로 반환되어 같은 도메인의 파서 등록 순서가 결정적입니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 문서 수가 `MAX_DOCUMENT_COUNT`를 초과하는 경우
    pub async fn load_directory(
        dir: impl AsRef<Path>,
    ) -> Result<Vec<ConfigDocument>, SyslogPipelineError> {
        let dir = dir.as_ref();
        let load_err = |reason: String| SyslogPipelineError::ParserLoad {
            path: dir.display().to_string(),
            reason,
        };

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| load_err(format!("failed to read directory: {e}")))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| load_err(format!("failed to read directory entry: {e}")))?
        {
            let path = entry.path();
            let supported = path
                .extension()
                .is_some_and(|ext| ext == "json" || ext == "yml" || ext == "yaml");
            if supported {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            match Self::load_file(&path).await {
                Ok(mut docs) => documents.append(&mut docs),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load parser config file, skipping"
                    );
                }
            }

            if documents.len() > MAX_DOCUMENT_COUNT {
                return Err(load_err(format!(
                    "too many parser documents: max {MAX_DOCUMENT_COUNT}"
                )));
            }
        }

        tracing::info!(
            dir = %dir.display(),
            count = documents.len(),
            "loaded parser config documents"
        );

        Ok(documents)
    }

    /// 단일 파일에서 설정 문서를 로드합니다.
    pub async fn load_file(
        path: impl AsRef<Path>,
    ) -> Result<Vec<ConfigDocument>, SyslogPipelineError> {
        let path = path.as_ref();
        let load_err = |reason: String| SyslogPipelineError::ParserLoad {
            path: path.display().to_string(),
            reason,
        };

        // 파일 크기 검증
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| load_err(format!("failed to read file metadata: {e}")))?;
        if metadata.len() > MAX_PARSER_FILE_SIZE {
            return Err(load_err(format!(
                "file too large: {} bytes (max: {MAX_PARSER_FILE_SIZE})",
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_err(format!("failed to read file: {e}")))?;

        let source = path.display().to_string();
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::parse_json(&content, &source)
        } else {
            Self::parse_yaml(&content, &source)
        }
    }

    /// JSON 문자열에서 설정 문서를 파싱합니다.
    pub fn parse_json(json_str: &str, source: &str) -> Result<Vec<ConfigDocument>, SyslogPipelineError> {
        let value: serde_json::Value =
            serde_json::from_str(json_str).map_err(|e| SyslogPipelineError::ParserLoad {
                path: source.to_owned(),
                reason: format!("JSON parse error: {e}"),
            })?;
        Self::documents_from_value(value, source)
    }

    /// YAML 문자열에서 설정 문서를 파싱합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Vec<ConfigDocument>, SyslogPipelineError> {
        let value: serde_json::Value =
            serde_yaml::from_str(yaml_str).map_err(|e| SyslogPipelineError::ParserLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;
        Self::documents_from_value(value, source)
    }

    fn documents_from_value(
        value: serde_json::Value,
        source: &str,
    ) -> Result<Vec<ConfigDocument>, SyslogPipelineError> {
        let values = match value {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };

        values
            .iter()
            .map(|v| {
                ConfigDocument::from_json(v).map_err(|e| SyslogPipelineError::ParserLoad {
                    path: source.to_owned(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}
