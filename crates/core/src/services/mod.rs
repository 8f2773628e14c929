//! Business logic services.

#![allow(missing_docs)]

pub mod billing;
pub mod challenge;
pub mod change_feed;
pub mod event;
pub mod flyer;
pub mod gallery;
pub mod live_wall;
pub mod moderation;
pub mod organizer;
pub mod qr;
pub mod slideshow;
pub mod upload;

pub use billing::{
    BillingService, CheckoutInput, CheckoutRequest, CheckoutSession, PaymentGateway,
    PaymentGatewayService, PlanTier, StripeGateway, WEBHOOK_UPLOAD_LIMIT, WebhookOutcome,
    verify_webhook_signature,
};
pub use challenge::{ChallengeService, CreateChallengeInput, UpdateChallengeInput, normalize_hashtag};
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeFeedService};
pub use event::{
    CreateEventInput, EventService, EventStats, PublicEvent, UpdateEventInput,
    check_event_password, ensure_owner, normalize_code,
};
pub use flyer::{FlyerContent, FlyerOptions, FlyerService, PaperSize};
pub use gallery::{GalleryService, ZipExport};
pub use live_wall::{
    LiveWallHandle, LiveWallService, LiveWallSession, LiveWallTiming, SessionSettings,
    SlideSource, WallMessage, WallUpdate,
};
pub use moderation::{EventDeletionReport, ModerationService};
pub use organizer::{OrganizerService, OrganizerSession, SignInInput, SignUpInput};
pub use qr::{QrMatrix, qr_svg};
pub use slideshow::{Slide, SlideshowCommand, SlideshowFrame, SlideshowState, SlotId};
pub use upload::{
    MAX_UPLOAD_BYTES, UploadInput, UploadOutcome, UploadService, media_too_large, validate_media_file,
};
