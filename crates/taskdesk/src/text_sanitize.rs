// Server-supplied text (instructions, history, error bodies, usernames)
// ends up in the terminal verbatim; strip anything that could drive it.

const MAX_LINE_CHARS: usize = 512;
const MAX_BLOCK_CHARS: usize = 16 * 1024;

#[derive(Clone, Copy)]
enum Scan {
    Text,
    Escape,
    Csi,
    // OSC ends on BEL or ST; DCS/SOS/PM/APC only on ST.
    Str { bel_ends: bool },
    StrEscape { bel_ends: bool },
}

fn clean(input: &str, keep_newlines: bool, max_chars: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_chars));
    let mut state = Scan::Text;
    let mut kept = 0usize;

    for c in input.chars() {
        state = match state {
            Scan::Escape => match c {
                '[' => Scan::Csi,
                ']' => Scan::Str { bel_ends: true },
                'P' | 'X' | '^' | '_' => Scan::Str { bel_ends: false },
                _ => Scan::Text,
            },
            Scan::Csi if ('@'..='~').contains(&c) => Scan::Text,
            Scan::Csi => Scan::Csi,
            Scan::Str { bel_ends } => match c {
                '\x07' if bel_ends => Scan::Text,
                '\x1b' => Scan::StrEscape { bel_ends },
                _ => Scan::Str { bel_ends },
            },
            Scan::StrEscape { bel_ends } => match c {
                '\\' => Scan::Text,
                '\x1b' => Scan::StrEscape { bel_ends },
                _ => Scan::Str { bel_ends },
            },
            Scan::Text => {
                let pushed = match c {
                    '\x1b' => {
                        state = Scan::Escape;
                        continue;
                    }
                    '\n' if keep_newlines => Some('\n'),
                    '\t' => Some(' '),
                    c if c.is_control() || is_bidi_control(c) => None,
                    c => Some(c),
                };
                if let Some(ch) = pushed {
                    out.push(ch);
                    kept += 1;
                    if kept >= max_chars {
                        out.push_str(" ...[truncated]");
                        return out;
                    }
                }
                Scan::Text
            }
        };
    }
    out
}

/// Single display line: no newlines, capped length.
pub fn sanitize_line(input: &str) -> String {
    clean(input, false, MAX_LINE_CHARS)
}

/// Multi-line block such as project instructions.
pub fn sanitize_block(input: &str) -> String {
    clean(input, true, MAX_BLOCK_CHARS)
}

fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{061C}' | '\u{200E}' | '\u{200F}')
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}
