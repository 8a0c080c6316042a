//! Offline quiz authoring tool. Prompts for questions on stdin and writes a
//! quiz document under `quizzes/`, in the same schema the
//! `/sessions/{code}/quiz` source fetch consumes. No session logic here.

use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::Context;
use hootline_back::services::quiz_service::QuizQuestionDoc;

fn main() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let file_name = prompt(&mut lines, "Enter quiz file name: ")?;
    println!("\n--- Creating quiz ---");

    let mut quiz = Vec::new();
    loop {
        println!("\n=== Question {} ===", quiz.len() + 1);

        let question = prompt(&mut lines, "Enter question: ")?;
        let image = prompt(&mut lines, "Enter image link (or press Enter to skip): ")?;

        let answers = [
            prompt(&mut lines, "Enter answer 1: ")?,
            prompt(&mut lines, "Enter answer 2: ")?,
            prompt(&mut lines, "Enter answer 3: ")?,
            prompt(&mut lines, "Enter answer 4: ")?,
        ];

        let correct = loop {
            let input = prompt(&mut lines, "Select correct answer (0-3): ")?;
            match input.trim().parse::<u8>() {
                Ok(index) if index <= 3 => break index,
                _ => println!("Invalid input, enter a number between 0 and 3."),
            }
        };

        quiz.push(QuizQuestionDoc {
            question,
            img: (!image.trim().is_empty()).then(|| image.trim().to_owned()),
            answers,
            correct,
        });

        println!("Question added.");
        let again = prompt(&mut lines, "\nAdd another question? (y/n): ")?;
        if !again.trim().eq_ignore_ascii_case("y") {
            break;
        }
    }

    let path = output_path(&file_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let document = serde_json::to_string_pretty(&quiz).context("serializing quiz")?;
    fs::write(&path, document).with_context(|| format!("writing {}", path.display()))?;

    println!("\nQuiz saved to {}", path.display());
    println!("Total questions: {}", quiz.len());

    Ok(())
}

fn prompt(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    label: &str,
) -> anyhow::Result<String> {
    print!("{label}");
    io::stdout().flush().context("flushing prompt")?;
    lines
        .next()
        .transpose()
        .context("reading stdin")?
        .context("stdin closed")
}

fn output_path(file_name: &str) -> PathBuf {
    let sanitized: String = file_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    let stem = if sanitized.is_empty() {
        "quiz".to_owned()
    } else {
        sanitized
    };

    PathBuf::from("quizzes").join(format!("{stem}.json"))
}
