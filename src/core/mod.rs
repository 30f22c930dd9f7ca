pub mod frame;
pub mod report;

pub use frame::{FrameImage, Pose, TrackingResult};
pub use report::{ParsedReport, PerformanceReport, ReportPayload};
