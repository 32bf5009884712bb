//! Review prompts sent to the language model.

use std::path::Path;

use crate::domain::review::ReviewKind;

pub const SYSTEM_PROMPT: &str = "You are a senior software engineer reviewing source files changed by recent commits. Be specific, cite line numbers, and rate each finding as High, Medium or Low severity.";

const CODE_REVIEW_PROMPT: &str = r#"Review the following {language} file `{path}`.

```{language}
{code}
```

Focus on:
1. Overall code quality (score it from 1 to 10)
2. Problems and potential risks
3. Readability and maintainability
4. Concrete improvement suggestions
5. Corrected code for any serious problem"#;

const BUG_DETECTION_PROMPT: &str = r#"Look for bugs and logic errors in the following {language} code.

```{language}
{code}
```

Check in particular:
1. Null or missing value handling
2. Out-of-bounds access
3. Logic errors
4. Error handling gaps
5. Resource leaks
6. Concurrency problems
7. Type errors
8. Boundary conditions

For every problem give the description, the line, the severity (High / Medium / Low) and a fix."#;

const SECURITY_CHECK_PROMPT: &str = r#"Audit the following {language} code for security vulnerabilities.

```{language}
{code}
```

Check in particular:
1. Injection (SQL, command, template)
2. Cross-site scripting
3. Cross-site request forgery
4. Missing input validation
5. Leaked secrets or sensitive data
6. Broken authentication or authorization
7. Unsafe deserialization
8. Path traversal

For every vulnerability give the risk level, the affected line, how it could be exploited and how to fix it."#;

const PERFORMANCE_ANALYSIS_PROMPT: &str = r#"Analyse the performance of the following {language} code.

```{language}
{code}
```

Cover:
1. Time complexity
2. Space complexity
3. Choice of algorithms and data structures
4. Loop and I/O optimisation opportunities
5. Memory usage
6. Caching opportunities

For every bottleneck give the current cost, the suggested change and the expected improvement."#;

fn template(kind: ReviewKind) -> &'static str {
    match kind {
        ReviewKind::CodeReview => CODE_REVIEW_PROMPT,
        ReviewKind::BugDetection => BUG_DETECTION_PROMPT,
        ReviewKind::SecurityCheck => SECURITY_CHECK_PROMPT,
        ReviewKind::PerformanceAnalysis => PERFORMANCE_ANALYSIS_PROMPT,
    }
}

/// Fills the template for `kind`. The code is substituted last so braces in
/// it are never treated as placeholders.
pub fn build_prompt(kind: ReviewKind, path: &str, language: &str, code: &str) -> String {
    template(kind)
        .replace("{language}", language)
        .replace("{path}", path)
        .replace("{code}", code)
}

/// Language tag for a file, used in prompts and code fences.
pub fn detect_language(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("py") => "python",
        Some("js" | "jsx") => "javascript",
        Some("ts" | "tsx") => "typescript",
        Some("java") => "java",
        Some("cpp" | "cc" | "hpp") => "cpp",
        Some("c" | "h") => "c",
        Some("cs") => "csharp",
        Some("php") => "php",
        Some("rb") => "ruby",
        Some("go") => "go",
        Some("rs") => "rust",
        Some("swift") => "swift",
        Some("kt") => "kotlin",
        Some("scala") => "scala",
        Some("html") => "html",
        Some("css") => "css",
        Some("sql") => "sql",
        Some("sh") => "bash",
        Some("yml" | "yaml") => "yaml",
        Some("json") => "json",
        Some("xml") => "xml",
        Some("md") => "markdown",
        _ => "text",
    }
}
