pub mod drive_client;
pub mod line_client;
pub mod vision_client;

pub use drive_client::DriveClient;
pub use line_client::LineClient;
pub use vision_client::VisionClient;
