//! Where each record of the data model lives.

use lovefinder_shared::constants::{
    CHATS, CHAT_IMAGES_PREFIX, DIRECTORY, ERADICATIONS, GALLERY_IMAGES_PREFIX, MATCHES, MESSAGES,
    PROFILE_IMAGES_PREFIX, USERS,
};
use lovefinder_shared::profile::clean_file_name;
use lovefinder_shared::{ChatId, PrincipalId};
use lovefinder_store::{CollectionPath, DocumentPath, Result};

pub fn users() -> Result<CollectionPath> {
    CollectionPath::root(USERS)
}

pub fn user(uid: &PrincipalId) -> Result<DocumentPath> {
    users()?.doc(uid.as_str())
}

/// One of the per-principal relation collections (`likesGiven`, ...).
pub fn relation(uid: &PrincipalId, collection: &str) -> Result<CollectionPath> {
    user(uid)?.collection(collection)
}

pub fn relation_doc(uid: &PrincipalId, collection: &str, other: &PrincipalId) -> Result<DocumentPath> {
    relation(uid, collection)?.doc(other.as_str())
}

/// `uid`'s copy of the match record with `partner`.
pub fn match_copy(uid: &PrincipalId, partner: &PrincipalId) -> Result<DocumentPath> {
    relation_doc(uid, MATCHES, partner)
}

pub fn directory() -> Result<CollectionPath> {
    CollectionPath::root(DIRECTORY)
}

pub fn directory_entry(uid: &PrincipalId) -> Result<DocumentPath> {
    directory()?.doc(uid.as_str())
}

pub fn chat(chat_id: &ChatId) -> Result<DocumentPath> {
    CollectionPath::root(CHATS)?.doc(&chat_id.to_string())
}

pub fn messages(chat_id: &ChatId) -> Result<CollectionPath> {
    chat(chat_id)?.collection(MESSAGES)
}

pub fn eradication(uid: &PrincipalId) -> Result<DocumentPath> {
    CollectionPath::root(ERADICATIONS)?.doc(uid.as_str())
}

pub fn profile_image_folder(uid: &PrincipalId) -> String {
    format!("{PROFILE_IMAGES_PREFIX}/{uid}")
}

pub fn profile_image_file(uid: &PrincipalId, file_name: &str) -> String {
    format!("{}/{}", profile_image_folder(uid), clean_file_name(file_name))
}

pub fn gallery_folder(uid: &PrincipalId) -> String {
    format!("{GALLERY_IMAGES_PREFIX}/{uid}")
}

pub fn gallery_file(uid: &PrincipalId, millis: i64, file_name: &str) -> String {
    format!("{}/{millis}_{}", gallery_folder(uid), clean_file_name(file_name))
}

pub fn chat_image_file(chat_id: &ChatId, millis: i64, file_name: &str) -> String {
    format!("{CHAT_IMAGES_PREFIX}/{chat_id}/{millis}_{}", clean_file_name(file_name))
}
