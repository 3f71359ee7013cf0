use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the WebSocket server, the topology graph and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub graph: GraphSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the topology graph.
#[derive(Debug, Deserialize, Clone)]
pub struct GraphSettings {
    /// Seconds between sampler ticks. `0` disables periodic publishing.
    pub interval_secs: u64,
    /// Ticks an idle publish edge, or a retained topic without publishers,
    /// survives before it is reclaimed.
    pub ttl_multiplier: u32,
    /// Topic the graph document is published on.
    pub topic: String,
    /// Topic the memory usage document is published on.
    pub memory_topic: String,
    /// Publishing here starts a latency probe for the publishing client.
    pub latency_topic: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub graph: Option<PartialGraphSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialGraphSettings {
    pub interval_secs: Option<u64>,
    pub ttl_multiplier: Option<u32>,
    pub topic: Option<String>,
    pub memory_topic: Option<String>,
    pub latency_topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            ttl_multiplier: 3,
            topic: "$SYS/graph".to_string(),
            memory_topic: "$SYS/graph/memory".to_string(),
            latency_topic: "$GRAPH/latency".to_string(),
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            graph: GraphSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server;
        let graph = self.graph;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            graph: GraphSettings {
                interval_secs: graph
                    .as_ref()
                    .and_then(|g| g.interval_secs)
                    .unwrap_or(default.graph.interval_secs),
                ttl_multiplier: graph
                    .as_ref()
                    .and_then(|g| g.ttl_multiplier)
                    .unwrap_or(default.graph.ttl_multiplier),
                topic: graph
                    .as_ref()
                    .and_then(|g| g.topic.clone())
                    .unwrap_or(default.graph.topic),
                memory_topic: graph
                    .as_ref()
                    .and_then(|g| g.memory_topic.clone())
                    .unwrap_or(default.graph.memory_topic),
                latency_topic: graph
                    .as_ref()
                    .and_then(|g| g.latency_topic.clone())
                    .unwrap_or(default.graph.latency_topic),
            },
            log: LogSettings {
                level: log
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(default.log.level),
            },
        }
    }
}
