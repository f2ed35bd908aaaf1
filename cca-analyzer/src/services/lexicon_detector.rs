//! Gazetteer-based entity detection
//!
//! Matches a lexicon of cultural entities against the input:
//! - case-insensitive, whole words only
//! - longest match wins at each position, matches never overlap
//! - offsets are character (Unicode scalar) positions
//!
//! The built-in lexicon can be extended with a TOML file:
//!
//! ```toml
//! [[entity]]
//! name = "Hanami"
//! aliases = ["cherry blossom viewing"]
//! entity_type = "festival"
//! summary = "Japanese custom of viewing cherry blossoms."
//! region = "Japan"
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::entity_enricher::{DetectorError, EntityDetector};
use crate::models::{DetectedEntity, EnrichmentData, EntityType, TextSpan};

/// One lexicon entry; entries without a summary are detected but not enriched
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LexiconEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub entity_type: EntityType,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub era: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub reference_url: Option<String>,
}

impl LexiconEntry {
    fn enrichment(&self) -> Option<EnrichmentData> {
        let summary = self.summary.as_ref().filter(|s| !s.trim().is_empty())?;
        Some(EnrichmentData {
            canonical_name: self.name.clone(),
            summary: summary.clone(),
            era: self.era.clone(),
            region: self.region.clone(),
            reference_url: self.reference_url.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    #[serde(default)]
    entity: Vec<LexiconEntry>,
}

/// Folded surface form pointing at its entry
#[derive(Debug)]
struct Pattern {
    chars: Vec<char>,
    entry: usize,
}

pub struct LexiconDetector {
    entries: Vec<LexiconEntry>,
    /// Longest first, so the first hit at a position is the longest one
    patterns: Vec<Pattern>,
}

impl LexiconDetector {
    /// Detector over the built-in lexicon
    pub fn builtin() -> Self {
        Self::from_entries(builtin_entries())
    }

    /// Built-in lexicon extended (and overridden by name) with a TOML file
    pub fn with_lexicon_file(path: &Path) -> Result<Self, DetectorError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DetectorError::Lexicon(format!("read {}: {}", path.display(), e)))?;
        let file: LexiconFile = toml::from_str(&content)
            .map_err(|e| DetectorError::Lexicon(format!("parse {}: {}", path.display(), e)))?;

        if let Some(bad) = file.entity.iter().find(|e| e.name.trim().is_empty()) {
            return Err(DetectorError::Lexicon(format!(
                "entry with blank name in {} ({:?})",
                path.display(),
                bad.entity_type
            )));
        }

        let extra = file.entity.len();
        let mut entries = builtin_entries();
        for entry in file.entity {
            match entries
                .iter_mut()
                .find(|e| e.name.eq_ignore_ascii_case(&entry.name))
            {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }

        info!(
            path = %path.display(),
            extra_entries = extra,
            total_entries = entries.len(),
            "Loaded entity lexicon"
        );
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<LexiconEntry>) -> Self {
        let mut patterns: Vec<Pattern> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            for surface in std::iter::once(&entry.name).chain(entry.aliases.iter()) {
                let chars: Vec<char> = surface.trim().chars().map(fold).collect();
                if !chars.is_empty() && !patterns.iter().any(|p| p.chars == chars) {
                    patterns.push(Pattern {
                        chars,
                        entry: index,
                    });
                }
            }
        }
        patterns.sort_by(|a, b| b.chars.len().cmp(&a.chars.len()));

        Self { entries, patterns }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Scan `text` and return detections in text order
    pub fn scan(&self, text: &str) -> Vec<DetectedEntity> {
        let original: Vec<char> = text.chars().collect();
        let folded: Vec<char> = original.iter().copied().map(fold).collect();
        let mut found = Vec::new();

        let mut pos = 0;
        while pos < folded.len() {
            let at_word_start = pos == 0 || !is_word_char(folded[pos - 1]);
            let hit = if at_word_start {
                self.patterns.iter().find(|p| {
                    let end = pos + p.chars.len();
                    end <= folded.len()
                        && folded[pos..end] == p.chars[..]
                        && (end == folded.len() || !is_word_char(folded[end]))
                })
            } else {
                None
            };

            match hit {
                Some(pattern) => {
                    let end = pos + pattern.chars.len();
                    let entry = &self.entries[pattern.entry];
                    let enrichment_data = entry.enrichment();
                    found.push(DetectedEntity {
                        span: TextSpan {
                            start: pos,
                            end,
                            text: original[pos..end].iter().collect(),
                        },
                        entity_type: entry.entity_type,
                        enriched: enrichment_data.is_some(),
                        enrichment_data,
                    });
                    pos = end;
                }
                None => pos += 1,
            }
        }

        found
    }
}

#[async_trait]
impl EntityDetector for LexiconDetector {
    fn detector_id(&self) -> &'static str {
        "lexicon"
    }

    async fn detect(&self, text: &str) -> Result<Vec<DetectedEntity>, DetectorError> {
        let entities = self.scan(text);
        debug!(detected = entities.len(), "Lexicon scan complete");
        Ok(entities)
    }
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

type Seed = (
    &'static str,
    &'static [&'static str],
    EntityType,
    Option<(&'static str, &'static str, &'static str, &'static str)>,
);

/// (name, aliases, type, Some((summary, era, region, wikipedia article)))
const BUILTIN_LEXICON: &[Seed] = &[
    ("Ancient Egypt", &["Egyptian civilization"], EntityType::Civilization,
        Some(("Nile valley civilization known for pharaonic kingship, monumental architecture and hieroglyphic writing.", "c. 3100 BCE - 30 BCE", "North Africa", "Ancient_Egypt"))),
    ("Mesopotamia", &["Sumer", "Babylonia"], EntityType::Civilization,
        Some(("Region between the Tigris and Euphrates where writing, cities and codified law first emerged.", "c. 3500 BCE - 539 BCE", "Western Asia", "Mesopotamia"))),
    ("Ancient Greece", &["Classical Greece", "Hellenic"], EntityType::Civilization,
        Some(("Mediterranean city-state culture that shaped Western philosophy, drama, democracy and science.", "c. 800 BCE - 146 BCE", "Southern Europe", "Ancient_Greece"))),
    ("Roman Empire", &["Ancient Rome", "Romans"], EntityType::Civilization,
        Some(("Mediterranean empire whose law, language and engineering underpin much of European culture.", "27 BCE - 476 CE (West)", "Mediterranean", "Roman_Empire"))),
    ("Byzantine Empire", &["Byzantium"], EntityType::Civilization,
        Some(("Eastern Roman Empire centered on Constantinople, bridging antiquity and the medieval world.", "330 - 1453", "Eastern Mediterranean", "Byzantine_Empire"))),
    ("Maya", &["Mayan civilization", "Mayans"], EntityType::Civilization,
        Some(("Mesoamerican civilization noted for its writing system, calendar and astronomy.", "c. 2000 BCE - 1697 CE", "Mesoamerica", "Maya_civilization"))),
    ("Aztec", &["Aztecs", "Mexica"], EntityType::Civilization,
        Some(("Nahuatl-speaking state of central Mexico with its capital at Tenochtitlan.", "1428 - 1521", "Mesoamerica", "Aztecs"))),
    ("Inca", &["Inca Empire", "Incas"], EntityType::Civilization,
        Some(("Largest empire of pre-Columbian America, governed from Cusco along an extensive road network.", "1438 - 1533", "Andes", "Inca_Empire"))),
    ("Han dynasty", &["Han China"], EntityType::Civilization,
        Some(("Chinese imperial dynasty that consolidated Confucian statecraft and opened the Silk Road.", "202 BCE - 220 CE", "East Asia", "Han_dynasty"))),
    ("Tang dynasty", &[], EntityType::Civilization,
        Some(("Cosmopolitan Chinese dynasty regarded as a golden age of poetry and the arts.", "618 - 907", "East Asia", "Tang_dynasty"))),
    ("Mughal Empire", &["Mughals"], EntityType::Civilization,
        Some(("Early modern empire of South Asia known for Indo-Persian art and architecture.", "1526 - 1857", "South Asia", "Mughal_Empire"))),
    ("Ottoman Empire", &["Ottomans"], EntityType::Civilization,
        Some(("Transcontinental empire ruled from Istanbul for over six centuries.", "1299 - 1922", "Anatolia, Balkans, Middle East", "Ottoman_Empire"))),
    ("Edo period", &["Tokugawa period", "Tokugawa shogunate"], EntityType::Civilization,
        Some(("Era of Japanese history under the Tokugawa shogunate marked by peace, isolation and urban culture.", "1603 - 1868", "Japan", "Edo_period"))),
    ("Vikings", &["Viking", "Norse"], EntityType::Civilization,
        Some(("Seafaring Scandinavians who raided, traded and settled across Europe and the North Atlantic.", "c. 793 - 1066", "Scandinavia", "Vikings"))),
    ("Renaissance", &["Italian Renaissance"], EntityType::Event,
        Some(("European cultural movement reviving classical learning and transforming art and science.", "14th - 17th century", "Europe", "Renaissance"))),
    ("Silk Road", &["Silk Routes"], EntityType::Place,
        Some(("Network of trade routes linking China with Central Asia, the Middle East and Europe.", "c. 130 BCE - 1450s", "Eurasia", "Silk_Road"))),
    ("Athens", &[], EntityType::Place,
        Some(("Greek city-state regarded as the birthplace of democracy and Western philosophy.", "Antiquity - present", "Greece", "Athens"))),
    ("Rome", &[], EntityType::Place,
        Some(("Capital of the Roman Republic and Empire and later the center of Latin Christianity.", "753 BCE - present", "Italy", "Rome"))),
    ("Constantinople", &["Istanbul"], EntityType::Place,
        Some(("City on the Bosporus that served as capital of the Byzantine and Ottoman empires.", "330 - present", "Turkey", "Constantinople"))),
    ("Kyoto", &["Heian-kyo"], EntityType::Place,
        Some(("Imperial capital of Japan for over a thousand years and a center of classical culture.", "794 - present", "Japan", "Kyoto"))),
    ("Edo", &[], EntityType::Place,
        Some(("Former name of Tokyo and seat of the Tokugawa shogunate.", "1603 - 1868", "Japan", "Edo"))),
    ("Baghdad", &[], EntityType::Place,
        Some(("Abbasid capital and home of the House of Wisdom during the Islamic Golden Age.", "762 - present", "Iraq", "Baghdad"))),
    ("Timbuktu", &[], EntityType::Place,
        Some(("West African center of trade and Islamic scholarship on the edge of the Sahara.", "12th century - present", "Mali", "Timbuktu"))),
    ("Alexandria", &[], EntityType::Place,
        Some(("Hellenistic Egyptian port famed for its Library and Lighthouse.", "331 BCE - present", "Egypt", "Alexandria"))),
    ("Machu Picchu", &[], EntityType::Place,
        Some(("Fifteenth-century Inca citadel in the Andes.", "c. 1450", "Peru", "Machu_Picchu"))),
    ("Buddhism", &["Buddhist"], EntityType::Tradition,
        Some(("Religious and philosophical tradition founded on the teachings of the Buddha.", "c. 5th century BCE - present", "South and East Asia", "Buddhism"))),
    ("Zen", &["Zen Buddhism", "Chan Buddhism"], EntityType::Tradition,
        Some(("School of Mahayana Buddhism emphasizing meditation and direct insight.", "6th century - present", "East Asia", "Zen"))),
    ("Confucianism", &["Confucian"], EntityType::Tradition,
        Some(("Chinese ethical and political tradition centered on ritual, filial piety and virtue.", "c. 5th century BCE - present", "East Asia", "Confucianism"))),
    ("Taoism", &["Daoism", "Taoist"], EntityType::Tradition,
        Some(("Chinese tradition emphasizing harmony with the Tao, the natural way of things.", "c. 4th century BCE - present", "East Asia", "Taoism"))),
    ("Hinduism", &["Hindu"], EntityType::Tradition,
        Some(("Diverse South Asian religious tradition rooted in the Vedas.", "c. 1500 BCE - present", "South Asia", "Hinduism"))),
    ("Stoicism", &["Stoic", "Stoics"], EntityType::Tradition,
        Some(("Hellenistic philosophy teaching virtue and acceptance of what lies beyond one's control.", "c. 300 BCE - present", "Mediterranean", "Stoicism"))),
    ("Shinto", &[], EntityType::Tradition,
        Some(("Indigenous religion of Japan centered on kami and shrine ritual.", "Prehistory - present", "Japan", "Shinto"))),
    ("Bushido", &["samurai code"], EntityType::Tradition,
        Some(("Idealized ethical code of the Japanese samurai.", "Edo period codification", "Japan", "Bushido"))),
    ("Confucius", &["Kong Fuzi"], EntityType::Person,
        Some(("Chinese philosopher whose teachings shaped East Asian ethics and government.", "551 - 479 BCE", "China", "Confucius"))),
    ("Socrates", &[], EntityType::Person,
        Some(("Athenian philosopher known through Plato's dialogues and the Socratic method.", "c. 470 - 399 BCE", "Greece", "Socrates"))),
    ("Plato", &[], EntityType::Person,
        Some(("Athenian philosopher, student of Socrates and founder of the Academy.", "c. 428 - 348 BCE", "Greece", "Plato"))),
    ("Julius Caesar", &["Caesar"], EntityType::Person,
        Some(("Roman general and statesman whose dictatorship ended the Republic.", "100 - 44 BCE", "Rome", "Julius_Caesar"))),
    ("Cleopatra", &[], EntityType::Person,
        Some(("Last active ruler of Ptolemaic Egypt.", "69 - 30 BCE", "Egypt", "Cleopatra"))),
    ("Matsuo Basho", &["Basho", "Matsuo Bashō", "Bashō"], EntityType::Person,
        Some(("Edo-period poet who raised haiku to a serious art form.", "1644 - 1694", "Japan", "Matsuo_Bashō"))),
    ("Rumi", &["Jalal al-Din Rumi"], EntityType::Person,
        Some(("Persian poet and Sufi mystic of the thirteenth century.", "1207 - 1273", "Persia, Anatolia", "Rumi"))),
    ("Homer", &[], EntityType::Person,
        Some(("Legendary Greek poet credited with the Iliad and the Odyssey.", "c. 8th century BCE", "Greece", "Homer"))),
    ("Shakespeare", &["William Shakespeare"], EntityType::Person,
        Some(("English playwright and poet, central figure of English literature.", "1564 - 1616", "England", "William_Shakespeare"))),
    ("Iliad", &["The Iliad"], EntityType::Work,
        Some(("Greek epic poem about the Trojan War attributed to Homer.", "c. 8th century BCE", "Greece", "Iliad"))),
    ("Odyssey", &["The Odyssey"], EntityType::Work,
        Some(("Greek epic of Odysseus' ten-year journey home after the Trojan War.", "c. 8th century BCE", "Greece", "Odyssey"))),
    ("Tao Te Ching", &["Daodejing"], EntityType::Work,
        Some(("Foundational Taoist text attributed to Laozi.", "c. 4th century BCE", "China", "Tao_Te_Ching"))),
    ("Bhagavad Gita", &["Gita"], EntityType::Work,
        Some(("Sanskrit scripture set within the Mahabharata epic.", "c. 2nd century BCE", "India", "Bhagavad_Gita"))),
    ("Epic of Gilgamesh", &["Gilgamesh"], EntityType::Work,
        Some(("Mesopotamian epic poem, among the oldest surviving works of literature.", "c. 2100 - 1200 BCE", "Mesopotamia", "Epic_of_Gilgamesh"))),
    ("The Tale of Genji", &["Tale of Genji", "Genji Monogatari"], EntityType::Work,
        Some(("Heian-period Japanese novel by Murasaki Shikibu.", "early 11th century", "Japan", "The_Tale_of_Genji"))),
    ("haiku", &["hokku"], EntityType::Work,
        Some(("Short Japanese verse form of three phrases in a 5-7-5 sound pattern.", "17th century - present", "Japan", "Haiku"))),
    ("Diwali", &["Deepavali"], EntityType::Festival,
        Some(("Hindu festival of lights celebrating the victory of light over darkness.", "Ancient - present", "South Asia", "Diwali"))),
    ("Lunar New Year", &["Chinese New Year", "Spring Festival"], EntityType::Festival,
        Some(("Festival marking the start of the lunisolar calendar year.", "Ancient - present", "East Asia", "Chinese_New_Year"))),
    ("Día de los Muertos", &["Dia de los Muertos", "Day of the Dead"], EntityType::Festival,
        Some(("Mexican holiday honoring deceased loved ones with altars and offerings.", "Pre-Columbian roots - present", "Mexico", "Day_of_the_Dead"))),
    ("Obon", &["Bon Festival"], EntityType::Festival,
        Some(("Japanese Buddhist custom honoring the spirits of ancestors.", "7th century - present", "Japan", "Bon_Festival"))),
    ("Trojan War", &[], EntityType::Event,
        Some(("Legendary war between the Greeks and Troy recounted in Greek epic.", "c. 12th century BCE (legendary)", "Anatolia", "Trojan_War"))),
    ("Meiji Restoration", &[], EntityType::Event,
        Some(("Restoration of imperial rule in Japan that launched rapid modernization.", "1868", "Japan", "Meiji_Restoration"))),
    ("samurai", &[], EntityType::Tradition, None),
    ("pharaoh", &["pharaohs"], EntityType::Tradition, None),
    ("geisha", &[], EntityType::Tradition, None),
    ("troubadour", &["troubadours"], EntityType::Tradition, None),
];

fn builtin_entries() -> Vec<LexiconEntry> {
    BUILTIN_LEXICON
        .iter()
        .map(|(name, aliases, entity_type, enrichment)| LexiconEntry {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            entity_type: *entity_type,
            summary: enrichment.map(|(summary, ..)| summary.to_string()),
            era: enrichment.map(|(_, era, ..)| era.to_string()),
            region: enrichment.map(|(_, _, region, _)| region.to_string()),
            reference_url: enrichment
                .map(|(.., article)| format!("https://en.wikipedia.org/wiki/{}", article)),
        })
        .collect()
}
