//! Bot API method names and their upload shape.

pub const GET_ME: &str = "getMe";
pub const GET_UPDATES: &str = "getUpdates";
pub const SET_WEBHOOK: &str = "setWebhook";
pub const SEND_MESSAGE: &str = "sendMessage";
pub const FORWARD_MESSAGE: &str = "forwardMessage";
pub const SEND_PHOTO: &str = "sendPhoto";
pub const SEND_AUDIO: &str = "sendAudio";
pub const SEND_DOCUMENT: &str = "sendDocument";
pub const SEND_STICKER: &str = "sendSticker";
pub const SEND_VIDEO: &str = "sendVideo";
pub const SEND_LOCATION: &str = "sendLocation";
pub const SEND_CHAT_ACTION: &str = "sendChatAction";
pub const GET_FILE: &str = "getFile";
pub const GET_USER_PROFILE_PHOTOS: &str = "getUserProfilePhotos";
pub const ANSWER_INLINE_QUERY: &str = "answerInlineQuery";

/// Sibling flag marking the file field as base64 data. Never sent to the API.
pub const BASE64_FLAG: &str = "base64";

/// The parameter that carries an uploadable file, for methods that take one.
pub fn file_field(method: &str) -> Option<&'static str> {
    match method {
        SEND_PHOTO => Some("photo"),
        SEND_AUDIO => Some("audio"),
        SEND_DOCUMENT => Some("document"),
        SEND_STICKER => Some("sticker"),
        SEND_VIDEO => Some("video"),
        _ => None,
    }
}

/// Methods whose parameters go out as a JSON body instead of a multipart form.
pub fn is_json_body(method: &str) -> bool {
    matches!(method, ANSWER_INLINE_QUERY | SET_WEBHOOK)
}
