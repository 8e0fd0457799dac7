//! Reserved words that are never recorded as user symbols

use std::collections::HashSet;

/// Default reserved-word set, lower case. Covers the ANSI-85 list plus the
/// common OO, intrinsic and vendor words that show up in procedure code.
pub const DEFAULT_RESERVED_WORDS: &[&str] = &[
    "accept", "access", "add", "address", "advancing", "after", "all", "allocate",
    "alphabet", "alphabetic", "alphabetic-lower", "alphabetic-upper", "alphanumeric",
    "alphanumeric-edited", "also", "alter", "alternate", "and", "any", "are", "area",
    "areas", "as", "ascending", "assign", "at", "author", "auto", "based", "before",
    "binary", "binary-char", "binary-double", "binary-long", "binary-short", "bit",
    "blank", "block", "boolean", "bottom", "by", "call", "cancel", "cd", "cf", "ch",
    "character", "characters", "class", "class-id", "clock-units", "close", "cobol",
    "code", "code-set", "collating", "column", "comma", "common", "communication",
    "comp", "comp-1", "comp-2", "comp-3", "comp-4", "comp-5", "comp-x", "computational",
    "computational-1", "computational-2", "computational-3", "computational-4",
    "computational-5", "compute", "condition", "configuration", "constant", "contains",
    "content", "continue", "control", "controls", "converting", "copy", "corr",
    "corresponding", "count", "crt", "currency", "cursor", "data", "date",
    "date-compiled", "date-written", "day", "day-of-week", "de", "debug-contents",
    "debug-item", "debug-line", "debug-name", "debug-sub-1", "debug-sub-2",
    "debug-sub-3", "debugging", "decimal-point", "declaratives", "default",
    "delete", "delimited", "delimiter", "depending", "descending", "destination",
    "detail", "disable", "display", "divide", "division", "down", "duplicates",
    "dynamic", "egi", "else", "emi", "enable", "end", "end-accept", "end-add",
    "end-call", "end-compute", "end-delete", "end-display", "end-divide",
    "end-evaluate", "end-exec", "end-if", "end-invoke", "end-multiply", "end-of-page",
    "end-perform", "end-read", "end-receive", "end-return", "end-rewrite",
    "end-search", "end-start", "end-string", "end-subtract", "end-unstring",
    "end-write", "entry", "environment", "eop", "equal", "error", "esi", "evaluate",
    "every", "exception", "exec", "execute", "exit", "extend", "external", "factory",
    "false", "fd", "file", "file-control", "filler", "final", "first", "footing",
    "for", "free", "from", "function", "function-id", "generate", "giving", "global",
    "go", "goback", "greater", "group", "heading", "high-value", "high-values",
    "i-o", "i-o-control", "id", "identification", "if", "implements", "in", "index",
    "indexed", "indicate", "inherits", "initial", "initialize", "initiate", "input",
    "input-output", "inspect", "installation", "interface", "interface-id", "into",
    "invalid", "invoke", "is", "just", "justified", "key", "label", "last", "leading",
    "left", "length", "less", "limit", "limits", "linage", "linage-counter", "line",
    "line-counter", "lines", "linkage", "local-storage", "lock", "low-value",
    "low-values", "memory", "merge", "message", "method", "method-id", "mode",
    "modules", "move", "multiple", "multiply", "national", "native", "negative",
    "new", "next", "no", "not", "null", "nulls", "number", "numeric",
    "numeric-edited", "object", "object-computer", "object-reference", "occurs", "of",
    "off", "omitted", "on", "open", "optional", "options", "or", "order",
    "organization", "other", "output", "overflow", "override", "packed-decimal",
    "padding", "page", "page-counter", "perform", "pf", "ph", "pic", "picture",
    "plus", "pointer", "position", "positive", "present", "printing", "procedure",
    "procedure-pointer", "procedures", "proceed", "program", "program-id",
    "property", "prototype", "purge", "queue", "quote", "quotes", "raise", "random",
    "rd", "read", "receive", "record", "records", "recursive", "redefines", "reel",
    "reference", "references", "relative", "release", "remainder", "removal",
    "renames", "replace", "replacing", "report", "reporting", "reports", "repository",
    "rerun", "reserve", "reset", "resume", "return", "return-code", "returning",
    "reversed", "rewind", "rewrite", "rf", "rh", "right", "rounded", "run", "same",
    "screen", "sd", "search", "section", "security", "segment", "segment-limit",
    "select", "self", "send", "sentence", "separate", "sequence", "sequential", "set",
    "sharing", "sign", "size", "sort", "sort-merge", "source", "source-computer",
    "sources", "space", "spaces", "special-names", "standard", "standard-1",
    "standard-2", "start", "status", "stop", "string", "sub-queue-1", "sub-queue-2",
    "sub-queue-3", "subtract", "sum", "super", "suppress", "symbolic", "sync",
    "synchronized", "table", "tallying", "tape", "terminal", "terminate", "test",
    "text", "than", "then", "through", "thru", "time", "times", "to", "top",
    "trailing", "true", "type", "typedef", "unit", "universal", "unlock", "unstring",
    "until", "up", "upon", "usage", "use", "using", "valid", "validate", "value",
    "values", "varying", "when", "when-compiled", "with", "words", "working-storage",
    "write", "zero", "zeroes", "zeros",
    // Embedded SQL/CICS words that would otherwise become references
    "sql", "cics", "include", "declare", "fetch", "where",
];

/// Build the default reserved-word set.
pub fn default_reserved_words() -> HashSet<String> {
    DEFAULT_RESERVED_WORDS.iter().map(|w| w.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_words_are_lower_case() {
        for word in DEFAULT_RESERVED_WORDS {
            assert_eq!(*word, word.to_ascii_lowercase(), "{} is not folded", word);
        }
    }

    #[test]
    fn test_structural_words_present() {
        let words = default_reserved_words();
        for word in ["perform", "section", "division", "copy", "working-storage", "thru"] {
            assert!(words.contains(word), "missing {}", word);
        }
    }
}
