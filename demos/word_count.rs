//! Word frequency counter pipeline
//!
//! Reads lines from stdin, splits into words, counts frequencies, and prints
//! the top-N words when the input ends.
//!
//! Usage: cargo run --example word_count --release
//!        (Then type lines of text and press Ctrl-D to finish)

use flowline::{Pipe, PipeLinker, Processor, Result as PipelineResult, Trackable};
use std::collections::HashMap;
use std::io::{self, BufRead};

/// Splits lines into lowercase words.
struct LineSplitter;

impl Processor for LineSplitter {
    type Input = String;
    type Output = String;

    fn process(&mut self, line: String) -> PipelineResult<Vec<String>> {
        Ok(line.split_whitespace().map(str::to_lowercase).collect())
    }

    fn name(&self) -> &str {
        "line_splitter"
    }
}

/// Strips punctuation and drops words that are too short to be interesting.
struct WordCleaner;

impl Processor for WordCleaner {
    type Input = String;
    type Output = String;

    fn process(&mut self, word: String) -> PipelineResult<Vec<String>> {
        let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.len() > 2 {
            Ok(vec![cleaned])
        } else {
            Ok(vec![])
        }
    }

    fn name(&self) -> &str {
        "word_cleaner"
    }
}

/// Accumulates counts and emits the top-N table once the stream drains.
struct WordCounter {
    counts: HashMap<String, usize>,
    top_n: usize,
}

impl WordCounter {
    fn new(top_n: usize) -> Self {
        Self {
            counts: HashMap::new(),
            top_n,
        }
    }
}

impl Processor for WordCounter {
    type Input = String;
    type Output = String;

    fn process(&mut self, word: String) -> PipelineResult<Vec<String>> {
        *self.counts.entry(word).or_insert(0) += 1;
        Ok(vec![])
    }

    fn finalize(&mut self) -> PipelineResult<Option<String>> {
        let mut items: Vec<_> = self.counts.drain().collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut report = format!("=== Top {} Words ===\n", self.top_n);
        for (i, (word, count)) in items.iter().take(self.top_n).enumerate() {
            report.push_str(&format!("{:2}. {} ({})\n", i + 1, word, count));
        }
        Ok(Some(report))
    }

    fn name(&self) -> &str {
        "word_counter"
    }
}

/// Prints whatever reaches the end of the chain.
struct Printer;

impl Processor for Printer {
    type Input = String;
    type Output = String;

    fn process(&mut self, report: String) -> PipelineResult<Vec<String>> {
        println!("\n{report}");
        Ok(vec![])
    }

    fn name(&self) -> &str {
        "printer"
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Word Frequency Counter Pipeline");
    println!("================================");
    println!("Enter lines of text (Ctrl-D to finish):");
    println!();

    let chain = PipeLinker::new(Pipe::new(LineSplitter, 128))
        .append(Pipe::new(WordCleaner, 256))?
        .append(Pipe::new(WordCounter::new(10), 64))?
        .append(Pipe::new(Printer, 16))?;
    chain.enable_tracking_with_step(1000);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        chain.submit(line?);
    }

    chain.shutdown()?;
    println!("Processing complete!");
    Ok(())
}
