/// Application name
pub const APP_NAME: &str = "Lovefinder";

/// Top-level collection holding one document per principal
pub const USERS: &str = "users";

/// Public directory listing, one entry per registered principal
pub const DIRECTORY: &str = "allUsers";

/// Top-level collection holding one document per chat session
pub const CHATS: &str = "chats";

/// Message sub-collection under a chat session
pub const MESSAGES: &str = "messages";

/// Persisted eradication progress, keyed by principal id
pub const ERADICATIONS: &str = "eradications";

/// Private collection used by the document-backed identity provider
pub const ACCOUNTS: &str = "_accounts";

/// Per-principal sub-collections
pub const LIKES_GIVEN: &str = "likesGiven";
pub const LIKES_RECEIVED: &str = "likesReceived";
pub const SKIPPED: &str = "skipped";
pub const MATCHES: &str = "matches";

/// Every per-principal sub-collection that references another principal.
pub const RELATION_COLLECTIONS: [&str; 4] = [LIKES_GIVEN, LIKES_RECEIVED, MATCHES, SKIPPED];

/// File store prefixes
pub const PROFILE_IMAGES_PREFIX: &str = "profileImages";
pub const GALLERY_IMAGES_PREFIX: &str = "user_images";
pub const CHAT_IMAGES_PREFIX: &str = "chatImages";

/// Minimum password length accepted by the identity provider
pub const MIN_PASSWORD_LEN: usize = 6;

/// Default cap on gallery images per principal
pub const DEFAULT_MAX_GALLERY_IMAGES: usize = 6;

/// Default maximum upload size in bytes (10 MiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;
