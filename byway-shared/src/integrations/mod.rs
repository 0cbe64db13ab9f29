/// Third-party service boundaries
///
/// Each boundary is an `async_trait` trait with one production client.
/// Handlers hold `Arc<dyn Trait>` so tests can swap in fakes.
///
/// - `mailer`: transactional email over SMTP
/// - `media`: Cloudinary image and video hosting
/// - `payment`: Stripe payment intents
/// - `video`: VdoCipher playback OTPs
/// - `push`: in-process notification fan-out for SSE

pub mod mailer;
pub mod media;
pub mod payment;
pub mod push;
pub mod video;

pub use mailer::{MailError, MailTemplate, Mailer, SmtpConfig, SmtpMailer};
pub use media::{
    CloudinaryConfig, CloudinaryStore, MediaError, MediaSource, MediaStore, ResourceKind,
    UploadOptions,
};
pub use payment::{PaymentError, PaymentGateway, PaymentIntent, StripeConfig, StripeGateway};
pub use push::NotificationHub;
pub use video::{VdoCipherClient, VdoCipherConfig, VideoError, VideoOtp, VideoOtpProvider};
