//! 큐 발행기 플러그인
//!
//! [`QueuePublisherService`]는 [`QueuePublisher`]를 core의
//! [`Plugin`](sysgrok_core::plugin::Plugin) 생명주기에 맞춰 감쌉니다.

use std::sync::Arc;

use tokio::sync::watch;

use sysgrok_core::error::{PipelineError, SysgrokError};
use sysgrok_core::pipeline::HealthStatus;
use sysgrok_core::plugin::{Plugin, PluginInfo, PluginState, PluginType};
use sysgrok_core::types::ConnectionStatus;

use crate::config::QueuePublisherConfig;
use crate::error::PublisherError;
use crate::publisher::{PublishHandle, PublisherStatus, QueuePublisher};
use crate::transport::BrokerTransport;

/// 서비스 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum ServiceState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 큐 발행기 플러그인
pub struct QueuePublisherService<T: BrokerTransport> {
    info: PluginInfo,
    state: ServiceState,
    publisher: QueuePublisher<T>,
}

impl<T: BrokerTransport> QueuePublisherService<T> {
    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            ServiceState::Initialized => "initialized",
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
        }
    }

    /// 발행 핸들을 반환합니다.
    pub fn handle(&self) -> PublishHandle<T> {
        self.publisher.handle()
    }

    /// 연결 상태 구독 채널을 반환합니다.
    pub fn subscribe(&self) -> watch::Receiver<PublisherStatus> {
        self.publisher.subscribe()
    }

    /// 내부 발행기
    pub fn publisher(&self) -> &QueuePublisher<T> {
        &self.publisher
    }
}

impl<T: BrokerTransport> Plugin for QueuePublisherService<T> {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        match self.state {
            ServiceState::Initialized => PluginState::Initialized,
            ServiceState::Running => PluginState::Running,
            ServiceState::Stopped => PluginState::Stopped,
        }
    }

    async fn init(&mut self) -> Result<(), SysgrokError> {
        self.publisher.config().validate()?;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), SysgrokError> {
        if self.state == ServiceState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        self.publisher.start().await?;
        self.state = ServiceState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SysgrokError> {
        if self.state != ServiceState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        self.publisher.shutdown().await?;
        self.state = ServiceState::Stopped;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            ServiceState::Running => {
                let status = self.publisher.status();
                if status.disabled || self.publisher.accounting().is_disabled() {
                    HealthStatus::Degraded("brokers down, publisher disabled".to_owned())
                } else if status.connection == ConnectionStatus::Down {
                    HealthStatus::Degraded("no broker deliveries observed".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            ServiceState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            ServiceState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 큐 발행기 플러그인 빌더
pub struct QueuePublisherBuilder<T: BrokerTransport> {
    config: QueuePublisherConfig,
    transport: Option<Arc<T>>,
}

impl<T: BrokerTransport> QueuePublisherBuilder<T> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: QueuePublisherConfig::default(),
            transport: None,
        }
    }

    /// 발행기 설정을 지정합니다.
    pub fn config(mut self, config: QueuePublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// 브로커 전송 계층을 설정합니다.
    pub fn transport(mut self, transport: Arc<T>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 플러그인을 빌드합니다.
    pub fn build(self) -> Result<QueuePublisherService<T>, PublisherError> {
        self.config.validate()?;

        let transport = self.transport.ok_or_else(|| PublisherError::Config {
            field: "transport".to_owned(),
            reason: "broker transport must be provided".to_owned(),
        })?;

        Ok(QueuePublisherService {
            info: PluginInfo {
                name: "queue-publisher".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                description: "partitioned message queue publisher".to_owned(),
                plugin_type: PluginType::QueuePublisher,
            },
            state: ServiceState::Initialized,
            publisher: QueuePublisher::new(self.config, transport),
        })
    }
}

impl<T: BrokerTransport> Default for QueuePublisherBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
