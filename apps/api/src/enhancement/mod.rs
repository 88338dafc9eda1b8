// Section enhancement: anonymize → three role agents → normalize → synthesize → ATS score.
// Agents only ever see anonymized text. PII is never restored on the result.

pub mod agents;
pub mod anonymizer;
pub mod ats;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod prompts;
pub mod synthesizer;

pub use agents::{AgentCaller, AgentRole, RetryPolicy};
pub use pipeline::EnhancementService;
