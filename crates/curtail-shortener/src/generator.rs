use crate::error::GeneratorError;
use curtail_core::{Base62Code, ShortCode};
use curtail_flake::{Flake, FlakeSettings, SystemClock};
use jiff::Timestamp;
use moka::sync::Cache;
use tracing::trace;
use typed_builder::TypedBuilder;

/// Produces candidate short codes for new urls.
///
/// Implementations are pure generators that never talk to storage. The
/// durable store's unique constraint stays the authoritative uniqueness
/// barrier; callers regenerate when a save collides there.
pub trait CodeGenerator: Send + Sync + 'static {
    fn generate(&self) -> Result<ShortCode, GeneratorError>;
}

/// Configures a [`FlakeCodeGenerator`].
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct GeneratorSettings {
    /// Machine index forwarded to the id generator, in `[0, 1023]`.
    pub machine_id: u16,
    /// Zero point for the id generator's timestamp field.
    pub epoch: Timestamp,
    /// How many recently issued codes to remember.
    #[builder(default = 4096)]
    pub recent_capacity: u64,
    /// How many times to draw a fresh id after hitting a remembered code.
    #[builder(default = 32)]
    pub max_attempts: u32,
}

/// Generates short codes by base62-encoding Flake ids.
///
/// Keeps a bounded cache of recently issued codes to short-circuit the
/// duplicates a sequence wrap can produce under extreme rates. A remembered
/// code just means drawing again; the sequence has already advanced.
pub struct FlakeCodeGenerator {
    flake: Flake<SystemClock>,
    recent: Cache<String, ()>,
    max_attempts: u32,
}

impl FlakeCodeGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self, GeneratorError> {
        let flake = Flake::new(
            FlakeSettings::builder()
                .machine_id(settings.machine_id)
                .epoch(settings.epoch)
                .build(),
        )?;
        let recent = Cache::builder()
            .max_capacity(settings.recent_capacity)
            .build();
        Ok(Self {
            flake,
            recent,
            max_attempts: settings.max_attempts,
        })
    }
}

impl CodeGenerator for FlakeCodeGenerator {
    fn generate(&self) -> Result<ShortCode, GeneratorError> {
        for attempt in 0..self.max_attempts {
            let code = Base62Code::from(self.flake.next_id()?);
            if self.recent.contains_key(code.as_str()) {
                trace!(code = %code, attempt, "code issued recently, drawing again");
                continue;
            }
            self.recent.insert(code.as_str().to_string(), ());
            return Ok(ShortCode::generated(code));
        }
        Err(GeneratorError::Saturated {
            attempts: self.max_attempts,
        })
    }
}
