//! 통계 디스패치 -- 파서 매칭 결과를 통계 레코드로 변환해 기록합니다.
//!
//! 매칭 하나에서 선언된 메트릭마다 [`StatRecord`] 하나가 만들어집니다.
//! 레코드는 서로 독립적으로 기록되어, 한 메트릭의 실패가 다른 메트릭을 막지 않습니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use sysgrok_core::error::{StatsError, SysgrokError};
use sysgrok_core::metrics as m;
use sysgrok_core::pipeline::StatsWriter;
use sysgrok_core::types::{StatRecord, StatValue, TagSet};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SyslogPipelineError;
use crate::grok::ParsedFields;
use crate::registry::{MetricType, ParserDefinition};

/// 송신자 주소 태그 이름
pub const SOURCE_TAG: &str = "Source";

/// 디스패치 문맥
#[derive(Debug, Clone, Copy)]
pub struct StatsContext<'a> {
    /// 송신자 주소
    pub source: &'a str,
    /// 이벤트 시각 (epoch 기준 마이크로초)
    pub timestamp_us: i64,
    /// 도메인 설정에서 온 추가 태그
    pub header_tags: &'a TagSet,
}

/// 통계 디스패처
#[derive(Clone)]
pub struct StatsDispatcher {
    writer: Arc<dyn StatsWriter>,
}

impl StatsDispatcher {
    /// 새 디스패처를 생성합니다.
    pub fn new(writer: Arc<dyn StatsWriter>) -> Self {
        Self { writer }
    }

    /// 매칭 결과를 통계 레코드로 기록합니다.
    ///
    /// 기록된 레코드 수를 반환합니다. 메트릭이 없는 파서는 아무것도 하지 않습니다.
    /// 기록 경로의 실패는 로그와 카운터로만 남습니다.
    ///
    /// # Panics
    /// `int`로 선언된 메트릭 값이 정수가 아니면 설정과 패턴이 어긋난 것이므로
    /// 나머지 메트릭을 모두 기록한 뒤 첫 번째 변환 에러로 panic합니다.
    pub fn dispatch(
        &self,
        ctx: &StatsContext<'_>,
        parser: &ParserDefinition,
        fields: &ParsedFields,
    ) -> usize {
        if parser.metrics.is_empty() {
            return 0;
        }

        let mut tags: TagSet = parser
            .tags
            .iter()
            .filter_map(|tag| fields.get(tag).map(|v| (tag.clone(), v.clone())))
            .collect();
        tags.extend(ctx.header_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        tags.insert(SOURCE_TAG.to_owned(), ctx.source.to_owned());

        let mut written = 0;
        let mut first_error = None;

        for (metric, metric_type) in &parser.metrics {
            let Some(raw) = fields.get(metric) else {
                continue;
            };

            let value = match cast(metric, raw, *metric_type) {
                Ok(value) => value,
                Err(e) => {
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            let record = StatRecord {
                timestamp_us: ctx.timestamp_us,
                table: parser.name.clone(),
                metric: metric.clone(),
                tags: tags.clone(),
                attributes: BTreeMap::from([(StatRecord::VALUE_ATTRIBUTE.to_owned(), value)]),
            };

            match self.writer.write(record) {
                Ok(()) => {
                    written += 1;
                    metrics::counter!(m::STATS_RECORDS_WRITTEN_TOTAL).increment(1);
                }
                Err(e) => {
                    metrics::counter!(m::STATS_WRITE_ERRORS_TOTAL).increment(1);
                    tracing::warn!(
                        table = %parser.name,
                        metric = %metric,
                        error = %e,
                        "failed to write stat record"
                    );
                }
            }
        }

        if let Some(e) = first_error {
            tracing::error!(table = %parser.name, error = %e, "metric type contract violated");
            panic!("{e}");
        }
        written
    }
}

fn cast(metric: &str, raw: &str, metric_type: MetricType) -> Result<StatValue, SyslogPipelineError> {
    match metric_type {
        MetricType::String => Ok(StatValue::Str(raw.to_owned())),
        MetricType::Int => raw
            .trim()
            .parse::<i64>()
            .map(StatValue::Int)
            .map_err(|e| SyslogPipelineError::MetricCast {
                metric: metric.to_owned(),
                value: raw.to_owned(),
                reason: e.to_string(),
            }),
    }
}

/// mpsc 채널 기반 통계 기록 경로
///
/// 분류 워커를 막지 않도록 대기 없이 전송하며, 채널이 가득 차면 에러를 반환합니다.
pub struct ChannelStatsWriter {
    tx: mpsc::Sender<StatRecord>,
}

impl ChannelStatsWriter {
    /// 새 기록 경로와 수신 채널을 생성합니다.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StatRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// 기존 송신측으로 기록 경로를 생성합니다.
    pub fn new(tx: mpsc::Sender<StatRecord>) -> Self {
        Self { tx }
    }
}

impl StatsWriter for ChannelStatsWriter {
    fn write(&self, record: StatRecord) -> Result<(), SysgrokError> {
        self.tx.try_send(record).map_err(|e| match e {
            TrySendError::Full(_) => StatsError::SinkFull {
                capacity: self.tx.max_capacity(),
            }
            .into(),
            TrySendError::Closed(_) => StatsError::SinkClosed.into(),
        })
    }
}
