//! Page announcements
//!
//! Each mounted view speaks its welcome/description message once, in the
//! current language. Re-renders of the same view stay silent; a new mount
//! announces again.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StorageError;
use crate::preferences::LanguageCode;
use crate::speech::SpeechOutput;

/// Language code → route path → announcement text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageMessageTable {
    messages: HashMap<String, HashMap<String, String>>,
}

impl PageMessageTable {
    pub fn new(messages: HashMap<String, HashMap<String, String>>) -> Self {
        Self { messages }
    }

    /// Load a table from a JSON file of the same shape
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn message(&self, language: &LanguageCode, path: &str) -> Option<&str> {
        self.messages
            .get(language.as_str())
            .and_then(|pages| pages.get(path))
            .map(String::as_str)
    }

    /// Messages for the application's pages in every supported language
    pub fn builtin() -> Self {
        let mut messages = HashMap::new();
        for (language, pages) in BUILTIN {
            let pages = pages
                .iter()
                .map(|(path, text)| (path.to_string(), text.to_string()))
                .collect();
            messages.insert(language.to_string(), pages);
        }
        Self { messages }
    }
}

type PageList = [(&'static str, &'static str); 6];

#[rustfmt::skip]
const BUILTIN: [(&str, PageList); 6] = [
    ("en-US", [
        ("/", "Welcome. Here are our features. Use voice commands or hover over items to learn more."),
        ("/pdf-to-voice", "PDF to Voice Converter. Upload a PDF file to convert it to speech."),
        ("/voice-notes", "Voice Notes. Record and manage your voice notes here."),
        ("/video-captioning", "Video Captioning. Upload a video to generate captions."),
        ("/braille-converter", "Braille Converter. Convert braille patterns to speech."),
        ("/image-analysis", "Image Analysis. Upload an image to understand its contents."),
    ]),
    ("hi-IN", [
        ("/", "Aapka swagat hai. Yeh hamari features hain. Voice commands ka istemal karein ya items par hover karein janne ke liye."),
        ("/pdf-to-voice", "PDF se awaaz converter. Ek PDF file upload karein aur use speech mein badlein."),
        ("/voice-notes", "Voice Notes. Yahan apne voice notes record aur manage karein."),
        ("/video-captioning", "Video Captioning. Video upload karein aur captions generate karein."),
        ("/braille-converter", "Braille Converter. Braille patterns ko speech mein badlein."),
        ("/image-analysis", "Image Analysis. Ek image upload karein aur uske content ko samjhein."),
    ]),
    ("bn-IN", [
        ("/", "Apnake swagat. Ei holo amader features. Voice commands babohar korun ba items e hover korun janar jonno."),
        ("/pdf-to-voice", "PDF theke voice converter. Ekta PDF file upload korun ebong seta speech e poriborton korun."),
        ("/voice-notes", "Voice Notes. Ekhane apnar voice notes record ebong manage korun."),
        ("/video-captioning", "Video Captioning. Video upload korun ebong captions generate korun."),
        ("/braille-converter", "Braille Converter. Braille patterns ke speech e rupantor korun."),
        ("/image-analysis", "Image Analysis. Ekta chhobi upload korun ebong tar bisoybastu boozhun."),
    ]),
    ("ta-IN", [
        ("/", "Ungalai varaverkirōm. Itha namadhu features. Voice commands-ai payanpaduthungal alladhu items-ai hover seyungal therindhukollavum."),
        ("/pdf-to-voice", "PDF to Voice Converter. Oru PDF file-ai upload seyungal mattum adhai speech-āga māṟṟungal."),
        ("/voice-notes", "Voice Notes. Iṅku ungaḷ voice notes-ai record matrum manage seyungal."),
        ("/video-captioning", "Video Captioning. Oru video upload seyungal matrum captions generate seyungal."),
        ("/braille-converter", "Braille Converter. Braille patterns-ai speech-āga māṟṟungal."),
        ("/image-analysis", "Image Analysis. Oru image upload seyungal matrum adhan poruḷ purindhukoḷḷungal."),
    ]),
    ("te-IN", [
        ("/", "Swagatam. Ivi ma features. Voice commands vadandi lekapote items meedha hover chesi telusukondi."),
        ("/pdf-to-voice", "PDF to Voice Converter. Oka PDF file upload chesi speech ga marchandi."),
        ("/voice-notes", "Voice Notes. Ikada mi voice notes record mariyu manage cheyyandi."),
        ("/video-captioning", "Video Captioning. Video upload chesi captions generate cheyyandi."),
        ("/braille-converter", "Braille Converter. Braille patterns ni speech ga marchandi."),
        ("/image-analysis", "Image Analysis. Oka image upload chesi dhani vishayalu ardham cheskondi."),
    ]),
    ("kn-IN", [
        ("/", "Swagatavannu. Idu namma features. Voice commands balasi athava items mele hover madi tilidukolli."),
        ("/pdf-to-voice", "PDF to Voice Converter. Ondu PDF file upload madi matthu adannu speech ge parivartisi."),
        ("/voice-notes", "Voice Notes. Illi nimmna voice notes record matthu manage madi."),
        ("/video-captioning", "Video Captioning. Video upload madi matthu captions generate madi."),
        ("/braille-converter", "Braille Converter. Braille patterns annannu speech ge parivartisi."),
        ("/image-analysis", "Image Analysis. Ondu image upload madi matthu adara vishayagalu tilidukolli."),
    ]),
];

/// Speaks the current page's message once per mounted view
pub struct PageAnnouncer {
    table: PageMessageTable,
    announced: bool,
}

impl PageAnnouncer {
    pub fn new(table: PageMessageTable) -> Self {
        Self {
            table,
            announced: false,
        }
    }

    /// A new view was mounted; it may announce again
    pub fn remount(&mut self) {
        self.announced = false;
    }

    pub fn has_announced(&self) -> bool {
        self.announced
    }

    /// Announce `path` unless excluded or already announced in this view
    ///
    /// Returns the spoken text.
    pub fn announce(
        &mut self,
        path: &str,
        excluded: bool,
        language: &LanguageCode,
        speech: &mut SpeechOutput,
    ) -> Option<String> {
        if excluded || self.announced {
            return None;
        }

        let Some(message) = self.table.message(language, path) else {
            debug!(path, %language, "no page message");
            return None;
        };

        let message = message.to_string();
        speech.speak(&message, false)?;
        self.announced = true;
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::{broadcast, mpsc, watch};

    use super::*;
    use crate::testing::RecordingSink;

    fn speech(sink: &RecordingSink) -> SpeechOutput {
        let (input_tx, _) = mpsc::unbounded_channel();
        let (speaking_tx, _) = watch::channel(false);
        let (event_tx, _) = broadcast::channel(16);
        SpeechOutput::new(
            Box::new(sink.clone()),
            LanguageCode::default(),
            speaking_tx,
            input_tx,
            event_tx,
        )
    }

    #[test]
    fn test_builtin_covers_supported_languages() {
        let table = PageMessageTable::builtin();
        for (code, _) in crate::preferences::SUPPORTED_LANGUAGES {
            let lang = LanguageCode::parse(code).unwrap();
            assert!(table.message(&lang, "/").is_some(), "missing home for {}", code);
            assert!(table.message(&lang, "/image-analysis").is_some());
        }
        assert!(table.message(&LanguageCode::default(), "/login").is_none());
    }

    #[test]
    fn test_announces_once_per_view() {
        let sink = RecordingSink::new();
        let mut speech = speech(&sink);
        let mut announcer = PageAnnouncer::new(PageMessageTable::builtin());
        let lang = LanguageCode::default();

        assert!(announcer.announce("/", false, &lang, &mut speech).is_some());
        assert!(announcer.announce("/", false, &lang, &mut speech).is_none());
        assert!(announcer.announce("/", false, &lang, &mut speech).is_none());
        assert_eq!(sink.spoken().len(), 1);

        announcer.remount();
        assert!(announcer.announce("/", false, &lang, &mut speech).is_some());
        assert_eq!(sink.spoken().len(), 2);
    }

    #[test]
    fn test_excluded_route_is_silent() {
        let sink = RecordingSink::new();
        let mut speech = speech(&sink);
        let mut announcer = PageAnnouncer::new(PageMessageTable::builtin());

        assert!(announcer
            .announce("/", true, &LanguageCode::default(), &mut speech)
            .is_none());
        assert!(!announcer.has_announced());
        assert!(sink.spoken().is_empty());
    }

    #[test]
    fn test_message_in_current_language() {
        let sink = RecordingSink::new();
        let mut speech = speech(&sink);
        let mut announcer = PageAnnouncer::new(PageMessageTable::builtin());
        let lang = LanguageCode::parse("hi-IN").unwrap();

        let text = announcer
            .announce("/voice-notes", false, &lang, &mut speech)
            .unwrap();
        assert!(text.starts_with("Voice Notes. Yahan"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.json");
        std::fs::write(&path, r#"{"fr-FR": {"/": "Bienvenue."}}"#).unwrap();

        let table = PageMessageTable::load(&path).unwrap();
        let lang = LanguageCode::parse("fr-FR").unwrap();
        assert_eq!(table.message(&lang, "/"), Some("Bienvenue."));
    }
}
