//! Client for the astrometry.net plate-solving web service.
//!
//! Calls are built as `RequestEnvelope`s, encoded to form or multipart
//! bodies, executed by a `Transport`, and decoded into typed responses.
//! `SubmissionPoller` sequences status calls until a job ends, and
//! `ResultFetcher` gathers whatever the job produced.

pub mod api;
pub mod encoder;
pub mod options;
pub mod poller;
pub mod results;
pub mod session;
pub mod transport;
pub mod types;
pub mod wcs;

pub use api::NovaClient;
pub use encoder::{EncodedRequest, FilePayload, RequestEnvelope};
pub use options::UploadOptions;
pub use poller::{PollConfig, PollState, SolveOutcome, SubmissionPoller};
pub use results::{ResultBundle, ResultFetcher, ResultFile};
pub use session::Session;
pub use transport::{HttpExchange, RawResponse, ReqwestExchange, Transport};
pub use types::{AnnotationRecord, Calibration, JobInfo, JobStatus, SubmissionStatus};
pub use wcs::{Survey, TanWcs};
