use healthrag_core::{Error, Result};

use crate::assemble::Context;

pub const CONTEXT_SLOT: &str = "{context}";
pub const QUESTION_SLOT: &str = "{question}";

pub const DEFAULT_TEMPLATE: &str = "Baseando-se nas informações abaixo, responda em português de forma médica e clara, \
numa linguagem acessível a quem não é profissional de saúde.

Contexto:
{context}

Pergunta: {question}
";

pub const NO_CONTEXT: &str = "(Não foi encontrado contexto relevante para esta pergunta.)";

/// Prompt text with `{context}` and `{question}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate { template: String }

impl Default for PromptTemplate {
    fn default() -> Self { Self { template: DEFAULT_TEMPLATE.to_string() } }
}

impl PromptTemplate {
    pub fn parse(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for slot in [CONTEXT_SLOT, QUESTION_SLOT] {
            if !template.contains(slot) {
                return Err(Error::InvalidConfig(format!("prompt template must contain {slot}")));
            }
        }
        Ok(Self { template })
    }

    pub fn from_settings(template: Option<&str>) -> Result<Self> {
        match template {
            Some(t) => Self::parse(t),
            None => Ok(Self::default()),
        }
    }

    /// Fill both slots in one pass, so slot-like text inside the context or
    /// question is left alone.
    pub fn render(&self, context: &Context, question: &str) -> String {
        let context_text = if context.is_empty() { NO_CONTEXT.to_string() } else { context.text() };
        let mut out = String::with_capacity(self.template.len() + context_text.len() + question.len());
        let mut rest = self.template.as_str();
        loop {
            let next = [(CONTEXT_SLOT, context_text.as_str()), (QUESTION_SLOT, question)]
                .into_iter()
                .filter_map(|(slot, value)| rest.find(slot).map(|at| (at, slot, value)))
                .min_by_key(|(at, _, _)| *at);
            match next {
                Some((at, slot, value)) => {
                    out.push_str(&rest[..at]);
                    out.push_str(value);
                    rest = &rest[at + slot.len()..];
                }
                None => {
                    out.push_str(rest);
                    break;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthrag_core::types::{Document, RankedCandidate};

    fn ctx(texts: &[&str]) -> Context {
        Context {
            passages: texts
                .iter()
                .map(|t| RankedCandidate { document: Document::new("id", *t), relevance_score: 1.0 })
                .collect(),
        }
    }

    #[test]
    fn default_prompt_carries_context_and_question() {
        let p = PromptTemplate::default().render(&ctx(&["Caminhar faz bem.", "Dormir também."]), "O que faz bem?");
        assert!(p.contains("Contexto:\nCaminhar faz bem.\n\nDormir também.\n"));
        assert!(p.contains("Pergunta: O que faz bem?"));
        assert!(p.contains("português"));
    }

    #[test]
    fn empty_context_is_stated_explicitly() {
        let p = PromptTemplate::default().render(&Context::default(), "Pergunta vazia?");
        assert!(p.contains(NO_CONTEXT));
        assert!(p.contains("Pergunta vazia?"));
    }

    #[test]
    fn slot_text_in_values_is_not_expanded() {
        let t = PromptTemplate::parse("C={context} Q={question}").unwrap();
        assert_eq!(t.render(&ctx(&["{question}"]), "why?"), "C={question} Q=why?");
    }

    #[test]
    fn template_missing_a_slot_is_rejected() {
        assert!(matches!(PromptTemplate::parse("only {context}"), Err(Error::InvalidConfig(_))));
        assert!(matches!(PromptTemplate::parse("only {question}"), Err(Error::InvalidConfig(_))));
    }
}
