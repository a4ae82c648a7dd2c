/// 填空测验
///
/// 从转录文本中挑选句子，挖掉一个关键词生成四选一题目
use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use crate::models::TranscriptChunk;

const MAX_SENTENCES: usize = 10;
const MAX_QUESTIONS: usize = 5;
const BLANK: &str = "_____";

pub(crate) static SENTENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid regex"));
static KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]?[a-z]+$").expect("valid regex"));

/// 一道测验题
#[derive(Debug, Clone, PartialEq)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub selected_index: Option<usize>,
}

impl QuizQuestion {
    pub fn is_answered(&self) -> bool {
        self.selected_index.is_some()
    }

    pub fn is_correct(&self) -> bool {
        self.selected_index == Some(self.correct_index)
    }
}

/// 选择答案的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct,
    Incorrect { correct_index: usize },
    /// 本题已作答或索引越界
    Ignored,
}

/// 生成题目
pub fn generate_questions<R: Rng + ?Sized>(
    transcript: &[TranscriptChunk],
    rng: &mut R,
) -> Vec<QuizQuestion> {
    let joined = transcript
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    SENTENCE_SPLIT
        .split(&joined)
        .filter(|s| s.trim().chars().count() > 20)
        .take(MAX_SENTENCES)
        .filter_map(|sentence| build_question(sentence, rng))
        .take(MAX_QUESTIONS)
        .collect()
}

fn build_question<R: Rng + ?Sized>(sentence: &str, rng: &mut R) -> Option<QuizQuestion> {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    if words.len() < 5 {
        return None;
    }

    let keyword_index = words.iter().enumerate().position(|(idx, w)| {
        idx > 1 && idx < words.len() - 1 && w.chars().count() >= 4 && KEYWORD.is_match(w)
    })?;
    let keyword = words[keyword_index];

    let mut blanked = words.clone();
    blanked[keyword_index] = BLANK;

    let mut distractors = words
        .iter()
        .enumerate()
        .filter(|(idx, w)| *idx != keyword_index && w.chars().count() >= 3)
        .map(|(_, w)| w.to_string());

    let mut options = vec![
        keyword.to_string(),
        distractors.next().unwrap_or_else(|| "option".to_string()),
        distractors.next().unwrap_or_else(|| "answer".to_string()),
        "none of the above".to_string(),
    ];
    options.shuffle(rng);
    let correct_index = options.iter().position(|o| o == keyword).unwrap_or(0);

    Some(QuizQuestion {
        prompt: format!("Complete the sentence:\n\"{}\"", blanked.join(" ")),
        options,
        correct_index,
        selected_index: None,
    })
}

/// 测验会话：当前题目、作答与计分
#[derive(Debug, Clone)]
pub struct Quiz {
    questions: Vec<QuizQuestion>,
    current: usize,
}

impl Quiz {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Self {
            questions,
            current: 0,
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// 当前题目；全部答完后为 `None`
    pub fn current(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current)
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.questions.len()
    }

    /// 每题只能作答一次
    pub fn select(&mut self, option: usize) -> AnswerOutcome {
        let Some(question) = self.questions.get_mut(self.current) else {
            return AnswerOutcome::Ignored;
        };
        if question.is_answered() || option >= question.options.len() {
            return AnswerOutcome::Ignored;
        }
        question.selected_index = Some(option);
        if question.is_correct() {
            AnswerOutcome::Correct
        } else {
            AnswerOutcome::Incorrect {
                correct_index: question.correct_index,
            }
        }
    }

    /// 进入下一题；当前题未作答时返回 false
    pub fn next(&mut self) -> bool {
        match self.current() {
            Some(question) if question.is_answered() => {
                self.current += 1;
                true
            }
            _ => false,
        }
    }

    pub fn score(&self) -> usize {
        self.questions.iter().filter(|q| q.is_correct()).count()
    }

    /// 正确率百分比（四舍五入）
    pub fn percentage(&self) -> u8 {
        if self.questions.is_empty() {
            return 0;
        }
        ((self.score() as f64 / self.questions.len() as f64) * 100.0).round() as u8
    }

    pub fn verdict(&self) -> &'static str {
        match self.percentage() {
            80.. => "Excellent!",
            60..=79 => "Good job!",
            _ => "Keep studying!",
        }
    }

    /// 清空作答，从第一题重新开始
    pub fn restart(&mut self) {
        self.current = 0;
        for question in &mut self.questions {
            question.selected_index = None;
        }
    }
}
