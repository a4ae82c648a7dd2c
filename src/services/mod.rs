pub mod annotation_store;
pub mod flashcards;
pub mod quiz;
pub mod study_notes;

pub use annotation_store::{AnnotationCollection, AnnotationStore, VoteBook};
pub use flashcards::{generate_flashcards, Flashcard, FlashcardDeck};
pub use quiz::{generate_questions, AnswerOutcome, Quiz, QuizQuestion};
pub use study_notes::{render_study_notes, study_notes_filename};
