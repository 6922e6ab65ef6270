use crate::config::Postprocess;
use unicode_normalization::UnicodeNormalization;

/// Cleans text produced by PDF extraction or OCR before it is returned to a client.
pub fn clean_text(cfg: &Postprocess, text: &str) -> String {
    let mut out = text.to_string();

    if cfg.normalize_newlines {
        out = out.replace("\r\n", "\n");
    }

    if cfg.normalize_unicode {
        out = out.nfkc().collect::<String>();
    }

    out = sanitize_control_chars(&out, &cfg.control_chars_to_sanitize);

    if cfg.trim_trailing_whitespace {
        out = out
            .lines()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
    }

    out
}

fn sanitize_control_chars(s: &str, codes: &[u8]) -> String {
    if codes.is_empty() {
        return s.to_string();
    }

    let mut mask = [false; 128];
    for &code in codes {
        if (code as usize) < mask.len() {
            mask[code as usize] = true;
        }
    }

    s.chars()
        .filter(|&ch| {
            if ch == '\n' || ch == '\r' || ch == '\t' {
                return true;
            }
            let cp = ch as u32;
            cp >= 128 || !mask[cp as usize]
        })
        .collect()
}
