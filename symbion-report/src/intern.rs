//! Table partagée des clés de métadonnées courantes.
//!
//! Construite une seule fois au premier accès puis jamais modifiée : le
//! décodage des maps passe chaque clé par [`intern`] et récupère un
//! `Arc<str>` partagé au lieu d'allouer une nouvelle chaîne par nœud.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub const PID: &str = "pid";
pub const PPID: &str = "ppid";
pub const NAME: &str = "name";
pub const CMDLINE: &str = "cmdline";
pub const THREADS: &str = "threads";
pub const HOST_NODE_ID: &str = "host_node_id";
pub const HOST_NAME: &str = "host_name";
pub const ADDR: &str = "addr";
pub const PORT: &str = "port";
pub const CONNTRACKED: &str = "conntracked";
pub const PROCSPIED: &str = "procspied";
pub const CONTAINER_ID: &str = "docker_container_id";
pub const CONTAINER_NAME: &str = "docker_container_name";
pub const IMAGE_ID: &str = "docker_image_id";
pub const IMAGE_NAME: &str = "docker_image_name";
pub const POD_ID: &str = "kubernetes_pod_id";
pub const POD_NAME: &str = "kubernetes_name";
pub const NAMESPACE: &str = "kubernetes_namespace";
pub const OS: &str = "os";
pub const LOCAL_NETWORKS: &str = "local_networks";
pub const CPU_USAGE: &str = "cpu_usage_percent";
pub const MEMORY_USAGE: &str = "memory_usage_bytes";

const COMMON_KEYS: &[&str] = &[
    PID,
    PPID,
    NAME,
    CMDLINE,
    THREADS,
    HOST_NODE_ID,
    HOST_NAME,
    ADDR,
    PORT,
    CONNTRACKED,
    PROCSPIED,
    CONTAINER_ID,
    CONTAINER_NAME,
    IMAGE_ID,
    IMAGE_NAME,
    POD_ID,
    POD_NAME,
    NAMESPACE,
    OS,
    LOCAL_NETWORKS,
    CPU_USAGE,
    MEMORY_USAGE,
    "process",
    "container",
    "container_image",
    "pod",
    "host",
];

fn table() -> &'static HashMap<&'static str, Arc<str>> {
    static TABLE: OnceLock<HashMap<&'static str, Arc<str>>> = OnceLock::new();
    TABLE.get_or_init(|| COMMON_KEYS.iter().map(|k| (*k, Arc::from(*k))).collect())
}

/// Shared `Arc<str>` for a common key, fresh allocation otherwise.
pub fn intern(key: &str) -> Arc<str> {
    match table().get(key) {
        Some(shared) => Arc::clone(shared),
        None => Arc::from(key),
    }
}
