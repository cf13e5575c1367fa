/// Upper bound on tokens per command line, and therefore on pipeline
/// stages: a pipeline can never have more stages than tokens.
pub const MAX_ARGS: usize = 16;

/// Split a raw command line into at most `MAX_ARGS` tokens. Delimiters are
/// runs of spaces or tabs; empty tokens are skipped, tokens past the cap
/// are silently dropped. No quoting and no escape processing.
pub fn parse_argv(line: &str) -> Vec<String> {
    line.split([' ', '\t'])
        .filter(|t| !t.is_empty())
        .take(MAX_ARGS)
        .map(str::to_string)
        .collect()
}

/// One stage of a pipeline: the argv it will exec with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub argv: Vec<String>,
}

/// Split an argv at `|` tokens. The stage count is always the separator
/// count plus one; an empty stage (leading, trailing, or doubled `|`) is
/// kept here and rejected by the pipeline engine before anything spawns.
pub fn parse_pipeline(argv: &[String]) -> Vec<Stage> {
    let mut stages = vec![Stage { argv: Vec::new() }];
    for token in argv {
        if token == "|" {
            stages.push(Stage { argv: Vec::new() });
        } else if let Some(stage) = stages.last_mut() {
            stage.argv.push(token.clone());
        }
    }
    stages
}
