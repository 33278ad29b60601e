/// 입찰 이벤트 브로커(Kafka) 연동
/// 커맨드 경로에서 확정된 이벤트를 발행하고, 프로젝션과 알림 서비스가 소비한다.
// region:    --- Imports
use crate::event_store::Event;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Topics
/// 입찰 이벤트 토픽
pub const EVENTS_TOPIC: &str = "bid-events";
/// 브로커 기동 확인용 토픽
const INIT_TOPIC: &str = "bid-init";
/// 프로젝션 컨슈머 그룹
const PROJECTION_GROUP: &str = "bid-projection-group";
// endregion: --- Topics

// region:    --- Kafka Producer
#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
}

/// KafkaProducer 구현
impl KafkaProducer {
    pub fn new(brokers: &str) -> Self {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all") // 입찰 이벤트 유실 방지
            .create()
            .expect("Producer creation error");

        KafkaProducer {
            producer: Arc::new(producer),
        }
    }

    /// 확정된 입찰 이벤트 발행
    /// 키는 상품(집계) id: 같은 상품의 이벤트는 같은 파티션에서 순서가 유지된다
    pub async fn send_event(&self, event: &Event) -> Result<(), String> {
        let payload = serde_json::to_string(event).map_err(|e| e.to_string())?;
        self.send_message(EVENTS_TOPIC, &event.aggregate_id.to_string(), &payload)
            .await
    }

    /// 메시지 전송
    pub async fn send_message(&self, topic: &str, key: &str, value: &str) -> Result<(), String> {
        info!(
            "{:<12} --> Kafka 메시지 전송: topic={}, key={}",
            "Producer", topic, key
        );

        self.producer
            .send(
                FutureRecord::to(topic).key(key).payload(value),
                Duration::from_secs(0),
            )
            .await
            .map_err(|(e, _)| format!("Error sending message: {:?}", e))?;

        Ok(())
    }
}

// endregion: --- Kafka Producer

// region:    --- Kafka Consumer
pub struct KafkaConsumer {
    consumer: Arc<StreamConsumer>,
}

/// KafkaConsumer 구현
impl KafkaConsumer {
    pub fn new(brokers: &str, group_id: &str) -> Self {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("fetch.max.bytes", "5242880")
            .set("allow.auto.create.topics", "true")
            .create()
            .expect("Consumer creation failed");

        KafkaConsumer {
            consumer: Arc::new(consumer),
        }
    }

    /// 입찰 이벤트 소비 루프
    pub async fn consume_events<F, Fut>(
        &self,
        topic: &str,
        handler: F,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Fn(Event) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), Box<dyn std::error::Error>>> + Send + 'static,
    {
        info!(
            "{:<12} --> Kafka 이벤트 소비 시작: topic={}",
            "Consumer", topic
        );
        self.consumer.subscribe(&[topic])?;

        loop {
            let message = match self.consumer.recv().await {
                Ok(message) => message,
                Err(e) => {
                    error!("{:<12} --> 메시지 수신 오류: {:?}", "Consumer", e);
                    continue;
                }
            };

            info!(
                "{:<12} --> 메시지 수신: topic={}, partition={}, offset={}",
                "Consumer",
                message.topic(),
                message.partition(),
                message.offset()
            );

            let Some(payload) = message.payload() else {
                warn!("{:<12} --> 빈 페이로드 수신", "Consumer");
                continue;
            };

            match serde_json::from_slice::<Event>(payload) {
                Ok(event) => {
                    debug!("{:<12} --> deserialize 성공: {:?}", "Consumer", event);
                    if let Err(e) = handler(event).await {
                        error!("{:<12} --> Kafka 이벤트 처리 오류: {:?}", "Consumer", e);
                    }
                }
                Err(e) => error!("{:<12} --> deserialize 오류: {:?}", "Consumer", e),
            }
        }
    }
}

// endregion: --- Kafka Consumer

// region:    --- Kafka Manager
pub struct KafkaManager {
    producer: Arc<KafkaProducer>,
    consumer: Arc<KafkaConsumer>,
    brokers: String,
}

impl Default for KafkaManager {
    fn default() -> Self {
        Self::new()
    }
}

/// KafkaManager 구현
impl KafkaManager {
    pub fn new() -> Self {
        let brokers =
            std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());

        KafkaManager {
            producer: Arc::new(KafkaProducer::new(&brokers)),
            consumer: Arc::new(KafkaConsumer::new(&brokers, PROJECTION_GROUP)),
            brokers,
        }
    }

    /// 프로듀서 반환
    pub fn get_producer(&self) -> Arc<KafkaProducer> {
        Arc::clone(&self.producer)
    }

    /// 컨슈머 반환
    pub fn get_consumer(&self) -> Arc<KafkaConsumer> {
        Arc::clone(&self.consumer)
    }

    /// Kafka 초기화
    /// 기동 확인 토픽으로 왕복 메시지를 보내 브로커 연결을 검증한다
    pub async fn initialize(&self) -> Result<(), String> {
        info!("{:<12} --> Kafka 초기화 시작", "Manager");

        self.consumer
            .consumer
            .subscribe(&[INIT_TOPIC])
            .map_err(|e| e.to_string())?;

        self.producer
            .send_message(INIT_TOPIC, "init-key", "init-message")
            .await?;

        let max_attempts = 10;
        for attempt in 1..=max_attempts {
            match time::timeout(Duration::from_secs(1), self.consumer.consumer.recv()).await {
                Ok(Ok(message)) => {
                    if message.payload() == Some(&b"init-message"[..]) {
                        info!("{:<12} --> Kafka 초기화 메시지 수신 확인", "Manager");
                        return Ok(());
                    }
                }
                Ok(Err(e)) => error!(
                    "{:<12} --> Kafka 초기화 메시지 수신 오류: {:?}",
                    "Manager", e
                ),
                Err(_) => warn!(
                    "{:<12} --> Kafka 초기화 메시지 수신 대기 중... (시도: {}/{})",
                    "Manager", attempt, max_attempts
                ),
            }
        }

        Err("Kafka 초기화 메시지 수신 실패".to_string())
    }

    /// 토픽 생성
    pub async fn create_topic(
        &self,
        topic_name: &str,
        num_partitions: i32,
        replication_factor: i32,
    ) -> Result<(), String> {
        info!("{:<12} --> Kafka 토픽 생성 시작: {}", "Manager", topic_name);

        let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .map_err(|e| format!("AdminClient 생성 실패: {:?}", e))?;

        let new_topic = NewTopic::new(
            topic_name,
            num_partitions,
            TopicReplication::Fixed(replication_factor),
        );

        admin_client
            .create_topics(&[new_topic], &AdminOptions::new())
            .await
            .map_err(|e| {
                error!("{:<12} --> Kafka 토픽 생성 실패: {:?}", "Manager", e);
                format!("토픽 생성 실패: {:?}", e)
            })?;

        info!("{:<12} --> Kafka 토픽 생성 성공: {}", "Manager", topic_name);
        Ok(())
    }
}

// endregion: --- Kafka Manager
