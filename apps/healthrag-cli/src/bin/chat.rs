//! Interactive question loop on the terminal.
use clap::Parser;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use healthrag_cli::{bootstrap, telemetry};
use healthrag_core::types::Query;

#[derive(Parser)]
#[command(name = "healthrag-chat")]
#[command(about = "Ask health questions against the indexed articles")]
struct Cli {
    /// Print every retrieved passage with its rerank score before each answer; `*` marks the ones sent to the model
    #[arg(long)]
    show_scores: bool,
}

const PREVIEW_CHARS: usize = 200;

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS { out.push_str("..."); }
    out.replace('\n', " ")
}

fn prompt() -> std::io::Result<()> {
    print!("\n> Faça uma pergunta (ou 'exit' para sair): ");
    std::io::stdout().flush()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init("warn");
    let cli = Cli::parse();
    let settings = bootstrap::load_settings()?;
    let pipeline = bootstrap::build_pipeline(&settings).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") { break; }
        if question.is_empty() {
            prompt()?;
            continue;
        }
        match pipeline.answer_traced(&Query::new(question)).await {
            Ok(trace) => {
                if cli.show_scores {
                    for (rank, p) in trace.ranked.iter().enumerate() {
                        let marker = if rank < trace.context.len() { '*' } else { ' ' };
                        let title = p.document.metadata.get("title").map(String::as_str).unwrap_or("");
                        println!("{marker} [{:>7.3}] {} {}", p.relevance_score, p.document.id, title);
                        println!("    {}", preview(&p.document.text));
                    }
                }
                println!("\n{}", trace.answer.text.trim());
            }
            Err(e) if e.is_transient() => eprintln!("Serviço temporariamente indisponível: {e}"),
            Err(e) => eprintln!("Erro: {e}"),
        }
        prompt()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_long_passages_on_chars() {
        let long = "é".repeat(250);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
        assert_eq!(preview("linha um\nlinha dois"), "linha um linha dois");
    }
}
