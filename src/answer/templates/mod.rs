
use std::sync::Arc;

use tracing::debug;

use super::{AnswerComposer, EntityFallback};
use crate::Result;
use crate::index::RetrievalResult;
use crate::retriever::Retriever;

const GENERIC_BUDGET: usize = 500;

/// Predicate over a lowercased question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// The question contains the phrase
    Phrase(String),
    /// The trimmed question equals the phrase
    Exactly(String),
    Any(Vec<Matcher>),
    All(Vec<Matcher>),
}

impl Matcher {
    #[inline]
    pub fn phrase(phrase: &str) -> Self {
        Self::Phrase(phrase.to_lowercase())
    }

    /// Matches if the question contains any of `phrases`
    #[inline]
    pub fn any_phrase(phrases: &[&str]) -> Self {
        Self::Any(phrases.iter().map(|p| Self::phrase(p)).collect())
    }

    #[inline]
    pub fn matches(&self, question: &str) -> bool {
        match self {
            Self::Phrase(phrase) => question.contains(phrase.as_str()),
            Self::Exactly(phrase) => question.trim() == phrase,
            Self::Any(matchers) => matchers.iter().any(|m| m.matches(question)),
            Self::All(matchers) => matchers.iter().all(|m| m.matches(question)),
        }
    }
}

/// Substring a passage must contain to be used as the sole context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFilter {
    /// Lowercase needle
    pub needle: String,
    /// Name used in replies
    pub label: String,
}

/// Answer layout: intro, truncated excerpt followed by `...`, then the optional outro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub intro: String,
    pub outro: Option<String>,
}

impl Template {
    #[inline]
    pub fn new(intro: &str, outro: Option<&str>) -> Self {
        Self {
            intro: intro.to_string(),
            outro: outro.map(str::to_string),
        }
    }

    #[inline]
    pub fn render(&self, excerpt: &str) -> String {
        match &self.outro {
            Some(outro) => format!("{}\n\n{}...\n\n{}", self.intro, excerpt, outro),
            None => format!("{}\n\n{}...", self.intro, excerpt),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub name: &'static str,
    pub matcher: Matcher,
    /// Retrieval query used instead of the question
    pub refined_query: Option<String>,
    pub entity_filter: Option<EntityFilter>,
    /// Maximum excerpt length in characters
    pub budget: usize,
    pub template: Template,
}

impl Topic {
    fn new(name: &'static str, matcher: Matcher, budget: usize, template: Template) -> Self {
        Self {
            name,
            matcher,
            refined_query: None,
            entity_filter: None,
            budget,
            template,
        }
    }

    fn refined(mut self, query: &str, needle: &str, label: &str) -> Self {
        self.refined_query = Some(query.to_string());
        self.entity_filter = Some(EntityFilter {
            needle: needle.to_lowercase(),
            label: label.to_string(),
        });
        self
    }
}

/// Routes questions through an ordered topic list; the first match wins
pub struct TemplateComposer {
    retriever: Arc<Retriever>,
    k: usize,
    entity_fallback: EntityFallback,
    topics: Vec<Topic>,
    generic: Template,
}

impl TemplateComposer {
    /// Composer with the built-in topic catalogue
    #[inline]
    pub fn new(retriever: Arc<Retriever>, k: usize, entity_fallback: EntityFallback) -> Self {
        Self::with_topics(retriever, k, entity_fallback, default_topics())
    }

    #[inline]
    pub fn with_topics(
        retriever: Arc<Retriever>,
        k: usize,
        entity_fallback: EntityFallback,
        topics: Vec<Topic>,
    ) -> Self {
        Self {
            retriever,
            k,
            entity_fallback,
            topics,
            generic: Template::new(
                "Based on the information I have:",
                Some("Is there a specific aspect you would like to know more about?"),
            ),
        }
    }

    #[inline]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// The topic a question routes to, `None` for the generic answer
    #[inline]
    pub fn route(&self, question: &str) -> Option<&Topic> {
        let question = question.to_lowercase();
        self.topics.iter().find(|t| t.matcher.matches(&question))
    }

    fn answer_topic(&self, topic: &Topic, context: &RetrievalResult) -> Result<String> {
        let refined;
        let context = match &topic.refined_query {
            Some(query) => {
                refined = self.retriever.retrieve_with_query_override(query, self.k)?;
                &refined
            }
            None => context,
        };

        let text = match &topic.entity_filter {
            Some(filter) => {
                let matching = context
                    .chunks()
                    .find(|chunk| chunk.text.to_lowercase().contains(&filter.needle));

                match (matching, self.entity_fallback) {
                    (Some(chunk), _) => chunk.text.clone(),
                    (None, EntityFallback::KeepContext) => context.context_text(),
                    (None, EntityFallback::NoAnswer) => {
                        debug!("No passage mentions {}, answering without context", filter.label);
                        return Ok(format!(
                            "I don't have any information about {} in the documents.",
                            filter.label
                        ));
                    }
                }
            }
            None => context.context_text(),
        };

        Ok(topic.template.render(&truncate(&text, topic.budget)))
    }
}

impl AnswerComposer for TemplateComposer {
    #[inline]
    fn compose(&self, question: &str, context: &RetrievalResult) -> Result<String> {
        match self.route(question) {
            Some(topic) => {
                debug!("Question routed to topic '{}'", topic.name);
                self.answer_topic(topic, context)
            }
            None => {
                debug!("No topic matched, using the generic answer");
                Ok(self
                    .generic
                    .render(&truncate(&context.context_text(), GENERIC_BUDGET)))
            }
        }
    }

    #[inline]
    fn name(&self) -> &'static str {
        "templates"
    }
}

/// First `max_chars` characters of `text`
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Built-in catalogue, most specific topics first
///
/// Named entities (Esther, Andika) precede the Reina topics, which precede
/// the broader Tekken and Mishima topics that also mention her.
#[inline]
pub fn default_topics() -> Vec<Topic> {
    let reina = || Matcher::phrase("reina");

    vec![
        Topic::new(
            "python-definition",
            Matcher::All(vec![
                Matcher::phrase("python"),
                Matcher::any_phrase(&["apa itu", "pengertian", "what is", "definition"]),
            ]),
            500,
            Template::new(
                "Python is a very popular high-level programming language. From the context I have:",
                Some(
                    "Python suits beginners thanks to its readable syntax, and it is used for web development, data science and AI.",
                ),
            ),
        ),
        Topic::new(
            "python-advantages",
            Matcher::All(vec![
                Matcher::phrase("python"),
                Matcher::any_phrase(&["keunggulan", "kelebihan", "advantage", "benefit"]),
            ]),
            300,
            Template::new(
                "Python's main advantages:\n\n\
                 1. Syntax that is easy to read and learn\n\
                 2. A very broad library ecosystem\n\
                 3. Cross-platform, it runs on every major operating system\n\
                 4. Open source and free\n\
                 5. A large, active community\n\n\
                 More detail:",
                None,
            ),
        ),
        Topic::new(
            "artificial-intelligence",
            Matcher::Any(vec![
                Matcher::any_phrase(&[
                    "artificial intelligence",
                    "apa itu ai",
                    "tentang ai",
                    "what is ai",
                    "about ai",
                ]),
                Matcher::Exactly("ai".to_string()),
            ]),
            400,
            Template::new(
                "Artificial Intelligence (AI) is technology that lets machines imitate human intelligence. From the context:",
                Some("AI is applied in NLP, computer vision and machine learning."),
            ),
        ),
        Topic::new(
            "web-development",
            Matcher::phrase("web development"),
            400,
            Template::new(
                "Python has powerful frameworks for web development. From the information I have:",
                Some("Popular frameworks include Django, Flask and FastAPI."),
            ),
        ),
        Topic::new(
            "data-science",
            Matcher::phrase("data science"),
            400,
            Template::new(
                "Data science in Python is built on a rich set of libraries. Information:",
                Some("The core libraries are NumPy, Pandas, Matplotlib and Scikit-learn."),
            ),
        ),
        Topic::new(
            "esther",
            Matcher::phrase("esther"),
            400,
            Template::new(
                "Here is what I know about Esther:",
                Some("Esther is the person Reina Mishima likes. Reina has had feelings for Esther for a long time."),
            ),
        )
        .refined("Reina Esther perasaan menyukai", "esther", "Esther"),
        Topic::new(
            "andika",
            Matcher::phrase("andika"),
            400,
            Template::new(
                "Here is what I know about Andika:",
                Some("Andika has a long-held crush on Reina Mishima that he keeps to himself."),
            ),
        )
        .refined("Reina Andika crush hubungan", "andika", "Andika"),
        Topic::new(
            "reina-crush",
            Matcher::Any(vec![
                Matcher::any_phrase(&[
                    "siapa yang disukai",
                    "yang disukai reina",
                    "who does reina like",
                ]),
                Matcher::All(vec![reina(), Matcher::phrase("yang disukai")]),
            ]),
            400,
            Template::new(
                "From Reina's personal background:",
                Some("Reina likes someone named Esther, whom she has admired for a long time."),
            ),
        )
        .refined("Reina menyukai esther perasaan", "esther", "Esther"),
        Topic::new(
            "reina-identity",
            Matcher::All(vec![
                reina(),
                Matcher::any_phrase(&["siapa", "apa itu", "who is", "what is"]),
            ]),
            500,
            Template::new(
                "Reina Mishima is a new character in Tekken 8 and a mysterious member of the Mishima family. From the information I have:",
                Some("Reina is Heihachi Mishima's daughter and wields a unique Purple Lightning ability."),
            ),
        ),
        Topic::new(
            "reina-origin",
            Matcher::All(vec![
                reina(),
                Matcher::any_phrase(&["asal usul", "latar belakang", "origin", "background"]),
            ]),
            500,
            Template::new(
                "Reina's origin is one of the more intriguing parts of Tekken lore. From the information I have:",
                Some("Reina was born of a secret relationship of Heihachi's and raised far from the Mishima family conflict."),
            ),
        ),
        Topic::new(
            "reina-abilities",
            Matcher::All(vec![
                reina(),
                Matcher::any_phrase(&["kemampuan", "kekuatan", "abilit", "power"]),
            ]),
            500,
            Template::new(
                "Reina's fighting abilities are unique within the Mishima family:",
                Some("She is known as 'Purple Lightning' for her violet electric technique."),
            ),
        ),
        Topic::new(
            "reina-family",
            Matcher::All(vec![
                reina(),
                Matcher::any_phrase(&["hubungan", "keluarga", "relationship", "family"]),
            ]),
            500,
            Template::new(
                "Reina's relationship with the Mishima family is complicated:",
                Some("As Heihachi's daughter she has a difficult relationship with every member of the family."),
            ),
        ),
        Topic::new(
            "tekken",
            Matcher::phrase("tekken"),
            400,
            Template::new(
                "Tekken has a deep storyline. From the information I have:",
                Some("The series is known for the Mishima family feud that spans generations."),
            ),
        ),
        Topic::new(
            "purple-lightning",
            Matcher::phrase("purple lightning"),
            400,
            Template::new(
                "Purple Lightning is Reina Mishima's signature ability:",
                Some("It is a violet variant of the Mishima family's lightning technique."),
            ),
        ),
        Topic::new(
            "devil-gene",
            Matcher::phrase("devil gene"),
            400,
            Template::new(
                "The Devil Gene is a central element of Tekken lore:",
                Some("It is passed down the Mishima bloodline and grants supernatural power."),
            ),
        ),
        Topic::new(
            "mishima-family",
            Matcher::phrase("mishima"),
            400,
            Template::new(
                "The Mishima family is at the heart of the Tekken story:",
                Some("Their feud has shaped the world for several generations."),
            ),
        ),
    ]
}
