//! Reading and editing a principal's own profile.

use bytes::Bytes;
use chrono::Utc;
use lovefinder_shared::profile::{validate_birthday_section, validate_cards, GalleryImage, InfoItem, TextCard};
use lovefinder_shared::PrincipalId;
use lovefinder_store::{DocumentStore, Fields, FileStore, SetOptions, StoreError};
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::models::{Profile, UserDocument};
use crate::paths;

pub async fn load_user(docs: &dyn DocumentStore, uid: &PrincipalId) -> Result<Option<UserDocument>> {
    match docs.get_document(&paths::user(uid)?).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// Profile of `uid` as shown to others; `None` if it does not exist or has
/// been tombstoned.
pub async fn profile(docs: &dyn DocumentStore, uid: &PrincipalId) -> Result<Option<Profile>> {
    Ok(load_user(docs, uid)
        .await?
        .filter(UserDocument::is_active)
        .map(|user| Profile::from_document(uid.clone(), user, Utc::now().date_naive())))
}

async fn merge(docs: &dyn DocumentStore, uid: &PrincipalId, fields: Fields) -> Result<()> {
    docs.set_document(&paths::user(uid)?, fields, SetOptions::merge())
        .await?;
    Ok(())
}

/// Save the birthday section. Every item must be filled; the birthdate item
/// also sets the derived `birthdate` field.
pub async fn save_birthday_section(docs: &dyn DocumentStore, uid: &PrincipalId, items: &[InfoItem]) -> Result<()> {
    let birthdate = validate_birthday_section(items)?;
    let mut fields = Fields::new().value("birthdaySection", serde_json::to_value(items)?);
    fields = match birthdate {
        Some(date) => fields.value("birthdate", date.to_string()),
        None => fields.delete("birthdate"),
    };
    merge(docs, uid, fields).await?;
    info!(principal = %uid.short(), "Birthday section saved");
    Ok(())
}

/// Save the activity list.
pub async fn save_activities(docs: &dyn DocumentStore, uid: &PrincipalId, cards: &[TextCard]) -> Result<()> {
    validate_cards(cards)?;
    merge(
        docs,
        uid,
        Fields::new().value("multipleQuestions", serde_json::to_value(cards)?),
    )
    .await
}

pub async fn save_main_info(docs: &dyn DocumentStore, uid: &PrincipalId, cards: &[TextCard]) -> Result<()> {
    validate_cards(cards)?;
    merge(
        docs,
        uid,
        Fields::new().value("mainInfo", serde_json::to_value(cards)?),
    )
    .await
}

/// Upload a new profile picture and point the profile at it. Returns the
/// download URL.
pub async fn set_profile_image(
    docs: &dyn DocumentStore,
    files: &dyn FileStore,
    uid: &PrincipalId,
    file_name: &str,
    data: Bytes,
) -> Result<String> {
    let path = paths::profile_image_file(uid, file_name);
    let stored = files.upload(&path, data).await?;
    let url = files.download_url(&stored).await?;
    merge(docs, uid, Fields::new().value("profileImage", url.clone())).await?;
    info!(principal = %uid.short(), path = %stored, "Profile image updated");
    Ok(url)
}

/// Append an image to the gallery, up to `max` images.
pub async fn add_gallery_image(
    docs: &dyn DocumentStore,
    files: &dyn FileStore,
    uid: &PrincipalId,
    max: usize,
    file_name: &str,
    data: Bytes,
) -> Result<GalleryImage> {
    let mut images = load_user(docs, uid).await?.unwrap_or_default().images;
    if images.len() >= max {
        return Err(ClientError::GalleryFull { max });
    }

    let path = paths::gallery_file(uid, Utc::now().timestamp_millis(), file_name);
    let stored = files.upload(&path, data).await?;
    let image = GalleryImage {
        url: files.download_url(&stored).await?,
        path: stored,
    };
    images.push(image.clone());
    merge(docs, uid, Fields::new().value("images", serde_json::to_value(&images)?)).await?;

    info!(principal = %uid.short(), count = images.len(), "Gallery image added");
    Ok(image)
}

/// Remove the gallery image at `index` and its file.
pub async fn remove_gallery_image(
    docs: &dyn DocumentStore,
    files: &dyn FileStore,
    uid: &PrincipalId,
    index: usize,
) -> Result<GalleryImage> {
    let mut images = load_user(docs, uid).await?.unwrap_or_default().images;
    if index >= images.len() {
        return Err(ClientError::NoSuchImage(index));
    }
    let removed = images.remove(index);

    match files.delete(&removed.path).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            warn!(path = %removed.path, "Gallery file already gone");
        }
        Err(e) => return Err(e.into()),
    }

    merge(
        docs,
        uid,
        Fields::new().value("images", serde_json::to_value(&images)?),
    )
    .await?;
    Ok(removed)
}
