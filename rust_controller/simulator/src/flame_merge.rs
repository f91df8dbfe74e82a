use flame::{self, Span};
use std::fs::File;
use std::io;
use std::mem;

/// Writes the main thread's spans to `path` as an HTML flame graph, with repeated spans of the
/// same name merged.
pub fn write_flame(path: &str) -> io::Result<()> {
    let mut spans = match flame::threads().into_iter().next() {
        Some(thread) => thread.spans,
        None => Vec::new(),
    };
    merge_spans(&mut spans);
    flame::dump_html_custom(&mut File::create(path)?, &spans)
}

fn merge_spans(spans: &mut Vec<Span>) {
    if spans.is_empty() {
        return;
    }

    // Sort so spans to be merged are adjacent and spans with the most children are merged into
    // to minimise allocations.
    spans.sort_unstable_by(|s1, s2| {
        let a = (&s1.name, s1.depth, usize::MAX - s1.children.len());
        let b = (&s2.name, s2.depth, usize::MAX - s2.children.len());
        a.cmp(&b)
    });

    // Copy children and sum delta from spans to be merged
    let mut merge_targets = vec![0];
    {
        let (first, rest) = spans.split_at_mut(1);
        let mut current = &mut first[0];
        for (i, span) in rest.iter_mut().enumerate() {
            if current.name == span.name && current.depth == span.depth {
                current.delta += span.delta;
                let children = mem::take(&mut span.children);
                current.children.extend(children);
            } else {
                current = span;
                merge_targets.push(i + 1);
            }
        }
    }

    // Move merged spans to the front of the spans vector
    for (target_i, &current_i) in merge_targets.iter().enumerate() {
        spans.swap(target_i, current_i);
    }

    spans.truncate(merge_targets.len());

    for span in spans {
        merge_spans(&mut span.children);
    }
}
