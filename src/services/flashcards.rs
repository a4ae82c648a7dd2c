/// 闪卡
///
/// 每个足够长的转录片段生成一张卡片：正面是时间点提问，背面是前两句内容
use rand::seq::SliceRandom;
use rand::Rng;

use super::quiz::SENTENCE_SPLIT;
use crate::models::TranscriptChunk;

const MAX_CARDS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
    /// 秒
    pub timestamp: f64,
}

/// 从转录片段生成闪卡
pub fn generate_flashcards(transcript: &[TranscriptChunk]) -> Vec<Flashcard> {
    transcript
        .iter()
        .filter_map(card_from_chunk)
        .take(MAX_CARDS)
        .collect()
}

fn card_from_chunk(chunk: &TranscriptChunk) -> Option<Flashcard> {
    let text = chunk.text.trim();
    if text.chars().count() < 30 {
        return None;
    }

    let sentences: Vec<&str> = SENTENCE_SPLIT
        .split(text)
        .filter(|s| s.trim().chars().count() > 10)
        .collect();
    if sentences.len() < 2 {
        return None;
    }

    let back = sentences[..2].join(". ").trim().to_string();
    if back.chars().count() <= 20 {
        return None;
    }

    Some(Flashcard {
        front: format!("What was discussed at {}?", chunk.start_formatted),
        back,
        timestamp: chunk.start,
    })
}

/// 闪卡组：当前位置与翻面状态
#[derive(Debug, Clone)]
pub struct FlashcardDeck {
    cards: Vec<Flashcard>,
    current: usize,
    flipped: bool,
}

impl FlashcardDeck {
    pub fn new(cards: Vec<Flashcard>) -> Self {
        Self {
            cards,
            current: 0,
            flipped: false,
        }
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn current(&self) -> Option<&Flashcard> {
        self.cards.get(self.current)
    }

    /// 进度文本，如 `3 / 10`
    pub fn progress(&self) -> String {
        format!("{} / {}", self.current + 1, self.cards.len())
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    /// 已在最后一张时返回 false
    pub fn next(&mut self) -> bool {
        if self.current + 1 < self.cards.len() {
            self.current += 1;
            self.flipped = false;
            true
        } else {
            false
        }
    }

    /// 已在第一张时返回 false
    pub fn previous(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            self.flipped = false;
            true
        } else {
            false
        }
    }

    /// 打乱顺序并回到第一张
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
        self.current = 0;
        self.flipped = false;
    }
}
