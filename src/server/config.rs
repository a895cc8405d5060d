//! Server configuration
//!
//! Defaults mirror the platform's environment surface; `from_env` reads the
//! recognized variables (`WS_PORT`, `JWT_SECRET`, `NODE_ENV`,
//! `KAFKA_BROKERS`, `KAFKA_CLIENT_ID`, `KAFKA_GROUP_ID`) and leaves
//! everything else at its default.

use std::net::SocketAddr;
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 3001;

const DEFAULT_JWT_SECRET: &str = "your-default-secret-key";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Secret for verifying credential signatures
    pub jwt_secret: String,

    /// Deployment environment tag ("development", "production", ...)
    pub environment: String,

    /// Event-bus broker addresses, for the platform wiring that feeds the
    /// broadcast entry points
    pub kafka_brokers: Vec<String>,

    /// Event-bus client identifier
    pub kafka_client_id: String,

    /// Event-bus consumer group identifier
    pub kafka_group_id: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Per-connection outbound queue length; overflow drops frames
    pub send_queue_capacity: usize,

    /// WebSocket handshake must complete within this time
    pub handshake_timeout: Duration,

    /// Credential verification must complete within this time
    pub auth_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            environment: "development".to_string(),
            kafka_brokers: vec!["localhost:9092".to_string()],
            kafka_client_id: "relay".to_string(),
            kafka_group_id: "relay-group".to_string(),
            max_connections: 0, // Unlimited
            send_queue_capacity: 256,
            handshake_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(5),
            tcp_nodelay: true, // Important for low latency
        }
    }
}

impl ServerConfig {
    /// Build a config from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("WS_PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.bind_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid WS_PORT"),
            }
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.is_empty() {
                config.jwt_secret = secret;
            }
        }
        if let Ok(environment) = std::env::var("NODE_ENV") {
            config.environment = environment;
        }
        if let Ok(brokers) = std::env::var("KAFKA_BROKERS") {
            let brokers = parse_brokers(&brokers);
            if !brokers.is_empty() {
                config.kafka_brokers = brokers;
            }
        }
        if let Ok(client_id) = std::env::var("KAFKA_CLIENT_ID") {
            config.kafka_client_id = client_id;
        }
        if let Ok(group_id) = std::env::var("KAFKA_GROUP_ID") {
            config.kafka_group_id = group_id;
        }

        config
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the credential-signing secret
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-connection outbound queue length
    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity.max(1);
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the credential verification timeout
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }
}

/// Split a comma-separated broker list, discarding empty segments.
fn parse_brokers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|broker| broker.trim().to_string())
        .filter(|broker| !broker.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.environment, "development");
        assert_eq!(config.kafka_brokers, vec!["localhost:9092".to_string()]);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.send_queue_capacity, 256);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_builder_bind() {
        let addr: SocketAddr = "127.0.0.1:9100".parse().unwrap();
        let config = ServerConfig::default().bind(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_queue_capacity_floor() {
        // Zero would make every send drop; clamp to one slot
        let config = ServerConfig::default().send_queue_capacity(0);

        assert_eq!(config.send_queue_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9200".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .jwt_secret("s3cret")
            .max_connections(50)
            .send_queue_capacity(64)
            .handshake_timeout(Duration::from_secs(3))
            .auth_timeout(Duration::from_secs(2));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.send_queue_capacity, 64);
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.auth_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_brokers() {
        assert_eq!(
            parse_brokers("kafka-1:9092,kafka-2:9092"),
            vec!["kafka-1:9092".to_string(), "kafka-2:9092".to_string()]
        );
        assert_eq!(parse_brokers(" kafka-1:9092 , "), vec!["kafka-1:9092".to_string()]);
        assert!(parse_brokers("").is_empty());
    }
}
