// Unique id / jump-target generation
//
// One counter per compilation; every prefix draws from it so tags never collide.
// Routine names shaped like a generated label are rejected before lowering.

pub const IF_TAG: &str = "if";
pub const LOOP_TAG: &str = "loop";
pub const BOOLOP_TAG: &str = "boolop";
pub const COMPARE_TAG: &str = "compare";

pub const ELSE_SUFFIX: &str = "else";
pub const END_SUFFIX: &str = "end";
pub const START_SUFFIX: &str = "start";
pub const SKIP_SUFFIX: &str = "skip";
pub const DONE_SUFFIX: &str = "done";

/// Every tag prefix with the suffixes appended to it in the listing.
const GENERATED_LABELS: &[(&str, &[&str])] = &[
    (IF_TAG, &[ELSE_SUFFIX, END_SUFFIX]),
    (LOOP_TAG, &[START_SUFFIX, END_SUFFIX]),
    (BOOLOP_TAG, &[SKIP_SUFFIX]),
    (COMPARE_TAG, &[DONE_SUFFIX]),
];

/// True if `name` has the shape of a label the lowering engine generates.
pub fn is_generated_label(name: &str) -> bool {
    GENERATED_LABELS.iter().any(|(prefix, suffixes)| {
        name.strip_prefix(prefix).map_or(false, |rest| {
            let suffix = rest.trim_start_matches(|ch: char| ch.is_ascii_digit());
            suffix.len() < rest.len() && suffixes.contains(&suffix)
        })
    })
}

#[derive(Debug, Default)]
pub struct LabelGenerator {
    unique_id: u32,
}

impl LabelGenerator {
    pub fn new() -> Self {
        LabelGenerator { unique_id: 0 }
    }

    /// Next id, starting at 1.
    pub fn next_id(&mut self) -> u32 {
        self.unique_id += 1;
        self.unique_id
    }

    pub fn next_tag(&mut self, prefix: &str) -> String {
        format!("{}{}", prefix, self.next_id())
    }
}
