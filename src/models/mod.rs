// Wire-facing metric models (field names match the consumer's schema)

mod cpu;
mod network;
mod pressure;
mod record;
mod storage;

pub use cpu::{CpuMetrics, LoadAverages};
pub use network::NetworkMetrics;
pub use pressure::{ContainerMetrics, PsiMetrics};
pub use record::{IpInfo, OsInfo, SampleRecord};
pub use storage::{DiskMetrics, MemoryMetrics};
