//! Instructions sent to the vision model.
//!
//! Every prompt lives here so tests can inspect them without a model, and so
//! wording changes never touch retry or parsing code. The prompts are written
//! in Japanese because the language clauses they are assembled from are
//! Japanese.

use crate::config::{DetailLevel, OutputFormat, RecognitionOptions};

/// Base instruction for free-text OCR.
pub const BASE_INSTRUCTION: &str = "この画像内のすべての文字を正確に読み取ってください。";

/// Appended for [`OutputFormat::Markdown`].
pub const MARKDOWN_CLAUSE: &str =
    "出力はマークダウン形式で整形してください。見出しやリスト、強調などを適切に使用してください。";

/// Appended for [`OutputFormat::Table`].
pub const TABLE_CLAUSE: &str = "表が含まれている場合は、マークダウンのテーブル形式で出力してください。";

/// Appended for [`DetailLevel::Summary`].
pub const SUMMARY_CLAUSE: &str = "読み取った内容の要約も最後に追加してください。";

/// Fixed instruction for business-card extraction.
///
/// Requests a single JSON object with the [`crate::contact::ContactRecord`]
/// keys, `null` for anything unreadable and arrays for phone numbers and
/// e-mail addresses.
pub const BUSINESS_CARD_PROMPT: &str = r#"
この名刺画像から以下の情報を読み取り、JSON形式で出力してください。
読み取れない項目はnullとしてください。
電話番号やメールアドレスが複数ある場合は配列で出力してください。

出力フォーマット（必ずこの形式のJSONのみを出力してください）:
{
    "name": "氏名",
    "name_kana": "氏名のフリガナ（あれば）",
    "company": "会社名",
    "department": "部署名",
    "title": "役職",
    "phone": ["電話番号1", "電話番号2"],
    "mobile": "携帯電話番号",
    "fax": "FAX番号",
    "email": ["メールアドレス1", "メールアドレス2"],
    "website": "WebサイトURL",
    "address": "住所（郵便番号含む）"
}
"#;

/// Assemble the free-text OCR instruction.
///
/// Clause order is fixed: language prefix, base instruction, then the format
/// clause and the summary clause on their own lines.
pub fn build_ocr_prompt(options: &RecognitionOptions) -> String {
    let mut prompt = match options.language.prompt_prefix() {
        Some(prefix) => format!("{prefix}、{BASE_INSTRUCTION}"),
        None => BASE_INSTRUCTION.to_string(),
    };

    match options.output_format {
        OutputFormat::Plain => {}
        OutputFormat::Markdown => {
            prompt.push('\n');
            prompt.push_str(MARKDOWN_CLAUSE);
        }
        OutputFormat::Table => {
            prompt.push('\n');
            prompt.push_str(TABLE_CLAUSE);
        }
    }

    if options.detail == DetailLevel::Summary {
        prompt.push('\n');
        prompt.push_str(SUMMARY_CLAUSE);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Language;

    fn all_options() -> Vec<RecognitionOptions> {
        let mut out = Vec::new();
        for language in Language::ALL {
            for output_format in OutputFormat::ALL {
                for detail in DetailLevel::ALL {
                    out.push(RecognitionOptions {
                        language,
                        output_format,
                        detail,
                    });
                }
            }
        }
        out
    }

    #[test]
    fn defaults_yield_bare_instruction() {
        assert_eq!(build_ocr_prompt(&RecognitionOptions::default()), BASE_INSTRUCTION);
    }

    #[test]
    fn every_combination_contains_base_in_order() {
        for opts in all_options() {
            let p = build_ocr_prompt(&opts);
            let base = p.find(BASE_INSTRUCTION).expect("base instruction present");

            if let Some(prefix) = opts.language.prompt_prefix() {
                assert!(p.starts_with(prefix), "{opts:?}: {p}");
                assert!(prefix.len() <= base);
            } else {
                assert_eq!(base, 0);
            }

            let format_pos = match opts.output_format {
                OutputFormat::Plain => None,
                OutputFormat::Markdown => p.find(MARKDOWN_CLAUSE),
                OutputFormat::Table => p.find(TABLE_CLAUSE),
            };
            if opts.output_format != OutputFormat::Plain {
                assert!(format_pos.expect("format clause present") > base);
            }

            let summary_pos = p.find(SUMMARY_CLAUSE);
            assert_eq!(summary_pos.is_some(), opts.detail == DetailLevel::Summary);
            if let (Some(f), Some(s)) = (format_pos, summary_pos) {
                assert!(f < s, "format must precede summary: {p}");
            }
            if let Some(s) = summary_pos {
                assert!(s > base);
            }
        }
    }

    #[test]
    fn language_prefix_joined_with_comma() {
        let p = build_ocr_prompt(&RecognitionOptions {
            language: Language::English,
            ..Default::default()
        });
        assert_eq!(p, format!("英語で、{BASE_INSTRUCTION}"));
    }

    #[test]
    fn full_prompt_layout() {
        let p = build_ocr_prompt(&RecognitionOptions {
            language: Language::Japanese,
            output_format: OutputFormat::Table,
            detail: DetailLevel::Summary,
        });
        let lines: Vec<&str> = p.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], TABLE_CLAUSE);
        assert_eq!(lines[2], SUMMARY_CLAUSE);
    }

    #[test]
    fn card_prompt_names_every_field() {
        for field in crate::contact::FIELD_ORDER {
            assert!(
                BUSINESS_CARD_PROMPT.contains(&format!("\"{}\"", field.key())),
                "missing {field:?}"
            );
        }
        assert!(BUSINESS_CARD_PROMPT.contains("null"));
    }
}
