use super::utils::read_input;
use anyhow::{Result, bail};
use drafter_core::search::{SearchQuery, SearchState};
use std::path::Path;

pub struct SearchArgs {
    pub query: String,
    pub regex: bool,
    pub match_case: bool,
    pub replace: Option<String>,
    pub max_matches: usize,
}

pub fn run(input: &Path, args: SearchArgs) -> Result<()> {
    let text = read_input(input)?;
    let query = if args.regex {
        SearchQuery::regex(args.query)
    } else {
        SearchQuery::plain(args.query)
    }
    .case_sensitive(args.match_case);

    let mut search = SearchState::with_limit(query.clone(), args.max_matches);
    search.set_query(query, &text);
    if let Some(error) = search.error() {
        bail!("Invalid pattern: {error}");
    }

    if let Some(replacement) = args.replace {
        match search.replace_all(&text, &replacement) {
            Some(result) => {
                eprintln!("Replaced {} match(es)", result.replaced);
                print!("{}", result.text);
            }
            None => print!("{text}"),
        }
        return Ok(());
    }

    for span in search.matches() {
        let (line, column) = line_column(&text, span.start);
        println!("{line}:{column}: {}", &text[span.clone()]);
    }
    if search.is_truncated() {
        eprintln!("Showing the first {} matches", search.matches().len());
    }
    Ok(())
}

/// 1-based line and character column of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}
