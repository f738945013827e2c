// src/session.rs
use crate::Services;
use crate::errors::ConciergeError;
use crate::models::*;
use crate::services::ImageNormalizer;
use futures_util::{StreamExt, TryStreamExt, stream};
use log::{error, info};

pub const PHOTO_PREP_NOTICE: &str = "Something went wrong while preparing your photo.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    Catalog,
    Upload,
    Result,
    ChatOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoTarget {
    Subject,
    Partner,
    ChatAttachment,
}

/// State owned by the presentation layer.
///
/// Every operation that awaits the model takes `&mut self`, so a session can
/// never have two diagnoses or two chat turns in flight at once.
pub struct ConciergeSession {
    services: Services,
    view: View,
    subject: Option<NormalizedImage>,
    partner: Option<NormalizedImage>,
    couple_mode: bool,
    mode: Option<DiagnosisMode>,
    result: Option<DiagnosisResult>,
    error: Option<String>,
    catalog: Vec<CatalogEntry>,
    chat_history: Vec<ChatMessage>,
    chat_attachment: Option<NormalizedImage>,
}

impl ConciergeSession {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            view: View::Home,
            subject: None,
            partner: None,
            couple_mode: false,
            mode: None,
            result: None,
            error: None,
            catalog: Vec::new(),
            chat_history: Vec::new(),
            chat_attachment: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn subject(&self) -> Option<&NormalizedImage> {
        self.subject.as_ref()
    }

    pub fn partner(&self) -> Option<&NormalizedImage> {
        self.partner.as_ref()
    }

    pub fn couple_mode(&self) -> bool {
        self.couple_mode
    }

    pub fn mode(&self) -> Option<DiagnosisMode> {
        self.mode
    }

    pub fn result(&self) -> Option<&DiagnosisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    pub fn chat_attachment(&self) -> Option<&NormalizedImage> {
        self.chat_attachment.as_ref()
    }

    pub fn begin_diagnosis(&mut self, mode: DiagnosisMode, couple_mode: bool) {
        self.mode = Some(mode);
        self.couple_mode = couple_mode;
        self.view = View::Catalog;
    }

    pub fn proceed_to_upload(&mut self) {
        self.view = View::Upload;
    }

    pub fn back_to_catalog(&mut self) {
        self.view = View::Catalog;
    }

    pub fn go_home(&mut self) {
        self.view = View::Home;
    }

    pub fn open_chat(&mut self) {
        self.view = View::ChatOnly;
    }

    pub fn close_chat(&mut self) {
        self.view = if self.result.is_some() {
            View::Result
        } else {
            View::Home
        };
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Drops everything except the services.
    pub fn reset(&mut self) {
        let services = self.services.clone();
        *self = Self::new(services);
    }

    /// Normalizes `files` in order and appends them to the catalog under the
    /// current mode. Nothing is appended if any file fails.
    pub async fn import_catalog(
        &mut self,
        files: Vec<RawImage>,
    ) -> Result<usize, ConciergeError> {
        let Some(mode) = self.mode else {
            return Ok(0);
        };
        if files.is_empty() {
            return Ok(0);
        }

        let normalizer: &ImageNormalizer = &self.services.normalizer;
        let imported: Result<Vec<NormalizedImage>, ConciergeError> = stream::iter(files)
            .then(move |file| normalizer.normalize(file))
            .try_collect()
            .await;

        match imported {
            Ok(images) => {
                let count = images.len();
                self.catalog.extend(
                    images
                        .into_iter()
                        .map(|image| CatalogEntry::user_selection(mode, image)),
                );
                info!("Imported {} catalog images ({} total)", count, self.catalog.len());
                Ok(count)
            }
            Err(e) => {
                error!("Catalog import failed: {}", e);
                self.error = Some(PHOTO_PREP_NOTICE.to_string());
                Err(e)
            }
        }
    }

    pub fn remove_catalog_entry(&mut self, id: &str) -> bool {
        let before = self.catalog.len();
        self.catalog.retain(|entry| entry.id != id);
        self.catalog.len() != before
    }

    /// Replaces one photo slot wholesale.
    pub async fn set_photo(
        &mut self,
        target: PhotoTarget,
        raw: RawImage,
    ) -> Result<(), ConciergeError> {
        let image = match self.services.normalizer.normalize(raw).await {
            Ok(image) => image,
            Err(e) => {
                error!("Preparing {:?} photo failed: {}", target, e);
                self.error = Some(PHOTO_PREP_NOTICE.to_string());
                return Err(e);
            }
        };

        match target {
            PhotoTarget::Subject => self.subject = Some(image),
            PhotoTarget::Partner => self.partner = Some(image),
            PhotoTarget::ChatAttachment => self.chat_attachment = Some(image),
        }
        Ok(())
    }

    pub fn clear_chat_attachment(&mut self) {
        self.chat_attachment = None;
    }

    pub fn can_diagnose(&self) -> bool {
        self.subject.is_some()
            && self.mode.is_some()
            && (!self.couple_mode || self.partner.is_some())
    }

    /// Returns `Ok(false)` without calling the model when a photo or the mode is
    /// missing. A failure keeps the previous result and sets the error notice.
    pub async fn run_diagnosis(&mut self) -> Result<bool, ConciergeError> {
        let (Some(subject), Some(mode)) = (self.subject.clone(), self.mode) else {
            return Ok(false);
        };
        let partner = if self.couple_mode {
            match self.partner.clone() {
                Some(partner) => Some(partner),
                None => return Ok(false),
            }
        } else {
            None
        };

        self.error = None;
        let catalog: Vec<CatalogEntry> = self
            .catalog
            .iter()
            .filter(|entry| entry.category == mode)
            .cloned()
            .collect();

        let outcome = self
            .services
            .concierge
            .diagnose(&subject, mode, &catalog, partner.as_ref())
            .await;

        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.view = View::Result;
                Ok(true)
            }
            Err(e) => {
                error!("Diagnosis failed: {}", e);
                self.error = Some(diagnosis_notice(&e).to_string());
                Err(e)
            }
        }
    }

    /// Catalog entry the last diagnosis picked, if it still exists.
    pub fn matched_dress(&self) -> Option<&CatalogEntry> {
        self.result.as_ref()?.matched_entry(&self.catalog)
    }

    /// Appends the user's turn, asks the model and appends its reply. On failure
    /// an apology is appended instead and the error is returned.
    pub async fn send_chat(&mut self, input: &str) -> Result<bool, ConciergeError> {
        let text = input.trim();
        if text.is_empty() && self.chat_attachment.is_none() {
            return Ok(false);
        }

        let attachment = self.chat_attachment.take();
        let prior = self.chat_history.len();
        self.chat_history.push(ChatMessage::user(input, attachment.clone()));

        let outcome = self
            .services
            .concierge
            .converse(&self.chat_history[..prior], input, attachment.as_ref())
            .await;

        match outcome {
            Ok(reply) => {
                if !reply.is_empty() {
                    self.chat_history.push(ChatMessage::assistant(reply));
                }
                Ok(true)
            }
            Err(e) => {
                error!("Chat turn failed: {}", e);
                self.chat_history.push(ChatMessage::assistant(chat_apology(&e)));
                Err(e)
            }
        }
    }
}

pub fn diagnosis_notice(err: &ConciergeError) -> &'static str {
    if err.is_quota() {
        "The AI usage limit has been reached. \
         If you are on the free tier, please wait a few minutes and try again."
    } else {
        "Something went wrong during the diagnosis. Please try again."
    }
}

pub fn chat_apology(err: &ConciergeError) -> &'static str {
    if err.is_quota() {
        "The request limit has been reached. Please wait a moment and try again."
    } else {
        "Sorry, the connection seems a little unstable right now."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::services::gemini::Part;
    use crate::services::prompts::IMAGE_ONLY_PROMPT;
    use crate::services::testing::{ScriptedModel, diagnosis_reply};
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;

    fn png(width: u32, height: u32) -> RawImage {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        RawImage::from_bytes(buffer.into_inner())
    }

    fn new_session(
        replies: Vec<Result<String, ConciergeError>>,
    ) -> (ConciergeSession, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(replies));
        let services = Services::new(
            model.clone(),
            ImageNormalizer::new(Duration::from_secs(10), 25 * 1024 * 1024),
        );
        (ConciergeSession::new(services), model)
    }

    fn image_count(model: &ScriptedModel, index: usize) -> usize {
        model.requests()[index].contents[0]
            .parts
            .iter()
            .filter(|p| p.is_image())
            .count()
    }

    #[tokio::test]
    async fn test_import_requires_mode() {
        let (mut session, _) = new_session(vec![]);
        assert_eq!(session.import_catalog(vec![png(20, 20)]).await.unwrap(), 0);
        assert!(session.catalog().is_empty());
    }

    #[tokio::test]
    async fn test_import_appends_in_selection_order() {
        let (mut session, _) = new_session(vec![]);
        session.begin_diagnosis(DiagnosisMode::Wedding, false);
        assert_eq!(session.view(), View::Catalog);

        let count = session
            .import_catalog(vec![png(120, 60), png(60, 120), png(30, 30)])
            .await
            .unwrap();

        assert_eq!(count, 3);
        let sizes: Vec<(u32, u32)> = session
            .catalog()
            .iter()
            .map(|e| (e.image.width, e.image.height))
            .collect();
        assert_eq!(sizes, vec![(120, 60), (60, 120), (30, 30)]);
        assert!(session.catalog().iter().all(|e| e.category == DiagnosisMode::Wedding));
        assert!(session.catalog().iter().all(|e| e.source == "User"));
    }

    #[tokio::test]
    async fn test_import_is_all_or_nothing() {
        let (mut session, _) = new_session(vec![]);
        session.begin_diagnosis(DiagnosisMode::Wedding, false);

        let err = session
            .import_catalog(vec![png(20, 20), RawImage::from_bytes(&b"garbage"[..])])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(session.catalog().is_empty());
        assert_eq!(session.error(), Some(PHOTO_PREP_NOTICE));
        session.dismiss_error();
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn test_remove_catalog_entry() {
        let (mut session, _) = new_session(vec![]);
        session.begin_diagnosis(DiagnosisMode::Wedding, false);
        session.import_catalog(vec![png(20, 20), png(30, 30)]).await.unwrap();

        let id = session.catalog()[0].id.clone();
        assert!(session.remove_catalog_entry(&id));
        assert!(!session.remove_catalog_entry(&id));
        assert_eq!(session.catalog().len(), 1);
        assert_eq!(session.catalog()[0].image.width, 30);
    }

    #[tokio::test]
    async fn test_diagnosis_requires_photos() {
        let (mut session, model) = new_session(vec![]);
        assert!(!session.run_diagnosis().await.unwrap());

        session.begin_diagnosis(DiagnosisMode::Wedding, true);
        session.set_photo(PhotoTarget::Subject, png(40, 40)).await.unwrap();
        assert!(!session.can_diagnose());
        assert!(!session.run_diagnosis().await.unwrap());
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_diagnosis_filters_catalog_by_mode() {
        let (mut session, model) = new_session(vec![Ok(diagnosis_reply().to_string())]);
        session.begin_diagnosis(DiagnosisMode::Color, false);
        session.import_catalog(vec![png(20, 20)]).await.unwrap();
        session.begin_diagnosis(DiagnosisMode::Wedding, false);
        session.import_catalog(vec![png(20, 20), png(25, 25)]).await.unwrap();

        session.set_photo(PhotoTarget::Subject, png(40, 40)).await.unwrap();
        session.set_photo(PhotoTarget::Partner, png(40, 40)).await.unwrap();
        assert!(session.run_diagnosis().await.unwrap());

        // subject + two wedding dresses, partner ignored outside couple mode
        assert_eq!(image_count(&model, 0), 3);
        assert_eq!(session.view(), View::Result);
        assert_eq!(session.result().unwrap().face_shape, "oval");
        assert!(session.matched_dress().is_none());
    }

    #[tokio::test]
    async fn test_couple_diagnosis_sends_partner() {
        let (mut session, model) = new_session(vec![Ok(diagnosis_reply().to_string())]);
        session.begin_diagnosis(DiagnosisMode::Wedding, true);
        session.set_photo(PhotoTarget::Subject, png(40, 40)).await.unwrap();
        session.set_photo(PhotoTarget::Partner, png(40, 40)).await.unwrap();

        assert!(session.run_diagnosis().await.unwrap());
        assert_eq!(image_count(&model, 0), 2);
    }

    #[tokio::test]
    async fn test_failed_diagnosis_keeps_previous_result() {
        let (mut session, _) = new_session(vec![
            Ok(diagnosis_reply().to_string()),
            Err(ConciergeError::QuotaExceeded("429".into())),
            Err(ConciergeError::Network("reset".into())),
        ]);
        session.begin_diagnosis(DiagnosisMode::Wedding, false);
        session.set_photo(PhotoTarget::Subject, png(40, 40)).await.unwrap();
        session.run_diagnosis().await.unwrap();
        let first = session.result().cloned();

        let err = session.run_diagnosis().await.unwrap_err();
        assert!(err.is_quota());
        assert_eq!(session.result().cloned(), first);
        assert!(session.error().unwrap().contains("wait"));

        let err = session.run_diagnosis().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(session.error(), Some(diagnosis_notice(&err)));
        assert!(!session.error().unwrap().contains("wait"));
        assert_eq!(session.result().cloned(), first);
    }

    #[tokio::test]
    async fn test_matched_dress_resolves_catalog_entry() {
        let (mut session, _) = new_session(vec![]);
        session.begin_diagnosis(DiagnosisMode::Wedding, false);
        session.import_catalog(vec![png(20, 20)]).await.unwrap();
        let id = session.catalog()[0].id.clone();

        let mut reply = diagnosis_reply();
        reply["bestMatchId"] = serde_json::json!(id);
        let (mut other, _) = new_session(vec![Ok(reply.to_string())]);
        other.begin_diagnosis(DiagnosisMode::Wedding, false);
        other.catalog = session.catalog().to_vec();
        other.set_photo(PhotoTarget::Subject, png(40, 40)).await.unwrap();
        other.run_diagnosis().await.unwrap();

        assert_eq!(other.matched_dress().map(|e| e.id.clone()), Some(id));
    }

    #[tokio::test]
    async fn test_chat_turns_accumulate() {
        let (mut session, model) =
            new_session(vec![Ok("Hello!".into()), Ok("Of course.".into())]);
        assert!(session.send_chat("hi").await.unwrap());
        assert!(session.send_chat("tell me more").await.unwrap());

        let texts: Vec<&str> = session.chat_history().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hi", "Hello!", "tell me more", "Of course."]);

        let requests = model.requests();
        assert_eq!(requests[0].contents.len(), 1);
        assert_eq!(requests[1].contents.len(), 3);
        assert_eq!(requests[1].contents[1].role, "model");
    }

    #[tokio::test]
    async fn test_chat_failure_appends_apology() {
        let (mut session, _) = new_session(vec![
            Err(ConciergeError::QuotaExceeded("429".into())),
            Err(ConciergeError::Unknown("boom".into())),
        ]);

        assert!(session.send_chat("hi").await.is_err());
        assert!(session.send_chat("again").await.is_err());

        let history = session.chat_history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert!(history[1].text.contains("wait"));
        assert_eq!(history[3].text, chat_apology(&ConciergeError::Unknown(String::new())));
    }

    #[tokio::test]
    async fn test_chat_image_only_turn() {
        let (mut session, model) = new_session(vec![Ok("What a lovely dress!".into())]);
        session
            .set_photo(PhotoTarget::ChatAttachment, png(50, 40))
            .await
            .unwrap();

        assert!(session.send_chat("  ").await.unwrap());
        assert!(session.chat_attachment().is_none());
        assert!(session.chat_history()[0].image.is_some());

        let requests = model.requests();
        let parts = &requests[0].contents[0].parts;
        assert_eq!(parts[0], Part::text(IMAGE_ONLY_PROMPT));
        assert!(parts[1].is_image());
    }

    #[tokio::test]
    async fn test_chat_image_only_turn_replays_with_photo_prompt() {
        let (mut session, model) =
            new_session(vec![Ok("What a lovely dress!".into()), Ok("Yes, really.".into())]);
        session
            .set_photo(PhotoTarget::ChatAttachment, png(50, 40))
            .await
            .unwrap();

        assert!(session.send_chat("").await.unwrap());
        assert!(session.send_chat("next").await.unwrap());

        let requests = model.requests();
        let live = &requests[0].contents[0];
        let replayed = &requests[1].contents[0];
        assert_eq!(live, replayed);
        assert_eq!(replayed.parts[0], Part::text(IMAGE_ONLY_PROMPT));
        assert!(replayed.parts[1].is_image());
        assert_eq!(requests[1].contents[2].parts, vec![Part::text("next")]);
    }

    #[tokio::test]
    async fn test_chat_ignores_blank_input_and_empty_replies() {
        let (mut session, model) = new_session(vec![Ok(String::new())]);
        assert!(!session.send_chat("   ").await.unwrap());
        assert!(model.requests().is_empty());

        assert!(session.send_chat("anyone there?").await.unwrap());
        assert_eq!(session.chat_history().len(), 1);
    }

    #[tokio::test]
    async fn test_navigation_and_reset() {
        let (mut session, _) = new_session(vec![Ok(diagnosis_reply().to_string())]);
        session.open_chat();
        session.close_chat();
        assert_eq!(session.view(), View::Home);

        session.begin_diagnosis(DiagnosisMode::Wedding, false);
        session.proceed_to_upload();
        assert_eq!(session.view(), View::Upload);
        session.set_photo(PhotoTarget::Subject, png(40, 40)).await.unwrap();
        session.run_diagnosis().await.unwrap();
        session.open_chat();
        session.close_chat();
        assert_eq!(session.view(), View::Result);

        session.reset();
        assert_eq!(session.view(), View::Home);
        assert!(session.result().is_none());
        assert!(session.subject().is_none());
        assert!(session.mode().is_none());
    }
}
