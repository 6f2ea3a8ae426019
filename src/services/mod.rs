pub mod delivery_date;
pub mod error_recorder;
pub mod extractor;
pub mod llm_service;
pub mod recognition;
pub mod summarizer;

pub use delivery_date::{compute_delivery_date, DeliveryRule};
pub use error_recorder::{ErrorRecorder, SUBJECT_FOLDER, SUBJECT_SEND_MESSAGE, SUBJECT_TRIGGER};
pub use llm_service::LlmService;
pub use recognition::{PollPolicy, RecognitionService};
pub use summarizer::Summarizer;
