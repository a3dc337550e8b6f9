pub mod canonical;
pub mod config;
pub mod inference;
pub mod perturb;
pub mod remote;
pub mod server;
pub mod session;
pub mod tensor;

/// Everything that can go wrong inside the pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The uploaded bytes are not a usable image
    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode image: {0}")]
    Encode(#[from] ::image::ImageError),

    /// The remote service could not be reached
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote service answered with a non-success status
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("a request is already in flight")]
    Busy,

    #[error("no image has been uploaded")]
    NoImage,

    #[error("no {0} image available")]
    Missing(&'static str),

    #[error("invalid epsilon: {0}")]
    InvalidEpsilon(f64),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// Work handed to the blocking thread pool never finished
    #[error("{0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Logging and test helpers
pub mod util {
    use tracing_subscriber::EnvFilter;

    /// Install the global tracing subscriber. `RUST_LOG` wins over
    /// `default_filter` when it is set
    pub fn init_tracing(default_filter: &str) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

}
