//! RTF decoder.
//!
//! Tokenizes the document with `nom`, tracks group state (skipped
//! destinations, `\ucN` fallback counts), and decodes `\'hh` escapes in the
//! document code page (`\ansicpg`). `\par`/`\line`/`\row` end lines, `\tab` and
//! `\cell` become tabs.

use super::encoding::decode_codepage;
use super::{DecodeLimits, DecodeResult, Decoder};
use crate::error::DecodeError;
use crate::format::Format;
use crate::offset::{NormalizedText, Origin, TextBuilder};
use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while1};
use nom::character::complete::{alpha1, char as byte_char, digit1};
use nom::combinator::{map, map_res, opt, recognize};
use nom::sequence::{pair, preceded, tuple};
use nom::IResult;

/// RTF decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtfDecoder;

/// Maximum group nesting accepted before the input is treated as corrupt.
const MAX_GROUP_DEPTH: usize = 256;

/// Destinations whose content is not body text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "object", "header", "footer", "headerl",
    "headerr", "headerf", "footerl", "footerr", "footerf", "listtable", "listoverridetable",
    "rsidtbl", "generator", "xmlnstbl", "themedata", "colorschememapping", "latentstyles",
    "datastore", "fldinst", "filetbl", "revtbl", "pgdsctbl",
];

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    GroupStart,
    GroupEnd,
    ControlWord(&'a str, Option<i32>),
    ControlSymbol(u8),
    Hex(u8),
    Text(&'a [u8]),
    Newline,
}

fn control_word(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, (name, param, _)) = preceded(
        byte_char('\\'),
        tuple((
            map_res(alpha1, std::str::from_utf8),
            opt(map_res(
                map_res(recognize(pair(opt(byte_char('-')), digit1)), std::str::from_utf8),
                str::parse::<i32>,
            )),
            opt(byte_char(' ')),
        )),
    )(input)?;
    Ok((rest, Token::ControlWord(name, param)))
}

fn hex_escape(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map_res(preceded(tag("\\'"), take(2usize)), |hex: &[u8]| {
        std::str::from_utf8(hex)
            .ok()
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .map(Token::Hex)
            .ok_or("invalid hex escape")
    })(input)
}

fn control_symbol(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(preceded(byte_char('\\'), take(1usize)), |sym: &[u8]| {
        Token::ControlSymbol(sym[0])
    })(input)
}

fn text_run(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(
        take_while1(|b: u8| b != b'\\' && b != b'{' && b != b'}' && b != b'\r' && b != b'\n'),
        Token::Text,
    )(input)
}

fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        map(byte_char('{'), |_| Token::GroupStart),
        map(byte_char('}'), |_| Token::GroupEnd),
        map(alt((tag("\r\n"), tag("\n"), tag("\r"))), |_| Token::Newline),
        hex_escape,
        control_word,
        control_symbol,
        text_run,
    ))(input)
}

#[derive(Debug, Clone, Copy)]
struct GroupState {
    skip: bool,
    uc: usize,
}

/// Accumulates text while decoding pending code-page bytes lazily.
struct RtfText {
    codepage: u16,
    lines: Vec<String>,
    line: String,
    pending: Vec<u8>,
    // High half of a `\u` surrogate pair waiting for its low half
    high_surrogate: Option<u16>,
    lost_surrogates: usize,
}

impl RtfText {
    fn flush_bytes(&mut self) {
        if !self.pending.is_empty() {
            self.drop_high_surrogate();
            let decoded = decode_codepage(&self.pending, self.codepage);
            self.line.push_str(&decoded);
            self.pending.clear();
        }
    }

    fn push_char(&mut self, c: char) {
        self.flush_bytes();
        self.drop_high_surrogate();
        self.line.push(c);
    }

    /// Push one `\u` code unit, pairing surrogate halves.
    fn push_utf16(&mut self, unit: u16) {
        self.flush_bytes();
        match unit {
            0xD800..=0xDBFF => {
                self.drop_high_surrogate();
                self.high_surrogate = Some(unit);
            },
            0xDC00..=0xDFFF => match self.high_surrogate.take() {
                Some(high) => {
                    for c in char::decode_utf16([high, unit]).flatten() {
                        self.line.push(c);
                    }
                },
                None => self.lost_surrogates += 1,
            },
            _ => {
                if let Some(c) = char::from_u32(unit as u32) {
                    self.push_char(c);
                }
            },
        }
    }

    fn drop_high_surrogate(&mut self) {
        if self.high_surrogate.take().is_some() {
            self.lost_surrogates += 1;
        }
    }

    fn end_line(&mut self) {
        self.flush_bytes();
        self.drop_high_surrogate();
        let line = std::mem::take(&mut self.line);
        self.lines.push(line.trim_end_matches(' ').to_string());
    }
}

impl Decoder for RtfDecoder {
    fn format(&self) -> Format {
        Format::Rtf
    }

    fn decode(&self, bytes: &[u8], _limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        if !bytes.starts_with(b"{\\rtf") {
            return Err(DecodeError::corrupt(Format::Rtf, "missing {\\rtf header"));
        }

        let mut out = RtfText {
            codepage: 1252,
            lines: Vec::new(),
            line: String::new(),
            pending: Vec::new(),
            high_surrogate: None,
            lost_surrogates: 0,
        };
        let mut stack: Vec<GroupState> = Vec::new();
        let mut state = GroupState { skip: false, uc: 1 };
        // Fallback characters still to skip after a \uN
        let mut skip_fallback = 0usize;
        let mut destination_pending = false;
        let mut input = bytes;
        let mut unbalanced = false;

        while !input.is_empty() {
            let (rest, tok) = match token(input) {
                Ok(parsed) => parsed,
                Err(_) => {
                    // Lone backslash at EOF or a malformed escape
                    input = &input[1..];
                    continue;
                },
            };
            input = rest;

            if skip_fallback > 0 {
                match tok {
                    Token::Hex(_) | Token::ControlSymbol(_) => {
                        skip_fallback -= 1;
                        continue;
                    },
                    Token::Text(run) => {
                        let n = skip_fallback.min(run.len());
                        skip_fallback -= n;
                        if n == run.len() {
                            continue;
                        }
                        if !state.skip {
                            out.pending.extend_from_slice(&run[n..]);
                        }
                        continue;
                    },
                    _ => skip_fallback = 0,
                }
            }

            match tok {
                Token::GroupStart => {
                    if stack.len() >= MAX_GROUP_DEPTH {
                        return Err(DecodeError::corrupt(Format::Rtf, "group nesting too deep"));
                    }
                    stack.push(state);
                    destination_pending = true;
                    continue;
                },
                Token::GroupEnd => {
                    match stack.pop() {
                        Some(previous) => {
                            if state.skip != previous.skip {
                                out.flush_bytes();
                            }
                            state = previous;
                        },
                        None => unbalanced = true,
                    }
                },
                Token::ControlSymbol(b'*') if destination_pending => state.skip = true,
                Token::ControlSymbol(sym) => {
                    if !state.skip {
                        match sym {
                            b'\\' | b'{' | b'}' => out.pending.push(sym),
                            b'~' => out.push_char('\u{a0}'),
                            b'_' => out.push_char('-'),
                            b'\n' | b'\r' => out.end_line(),
                            _ => {},
                        }
                    }
                },
                Token::ControlWord(word, param) => {
                    if destination_pending && SKIPPED_DESTINATIONS.contains(&word) {
                        state.skip = true;
                    }
                    match word {
                        "ansicpg" => {
                            if let Some(cp) = param.and_then(|p| u16::try_from(p).ok()) {
                                out.flush_bytes();
                                out.codepage = cp;
                            }
                        },
                        "uc" => state.uc = param.unwrap_or(1).max(0) as usize,
                        "u" if !state.skip => {
                            if let Some(code) = param {
                                // Negative values encode code units above 32767
                                out.push_utf16((code as i64).rem_euclid(65536) as u16);
                                skip_fallback = state.uc;
                            }
                        },
                        "par" | "line" | "row" | "sect" | "page" if !state.skip => out.end_line(),
                        "tab" | "cell" if !state.skip => out.push_char('\t'),
                        "emdash" if !state.skip => out.push_char('\u{2014}'),
                        "endash" if !state.skip => out.push_char('\u{2013}'),
                        "bullet" if !state.skip => out.push_char('\u{2022}'),
                        "lquote" if !state.skip => out.push_char('\u{2018}'),
                        "rquote" if !state.skip => out.push_char('\u{2019}'),
                        "ldblquote" if !state.skip => out.push_char('\u{201c}'),
                        "rdblquote" if !state.skip => out.push_char('\u{201d}'),
                        _ => {},
                    }
                },
                Token::Hex(byte) => {
                    if !state.skip {
                        out.pending.push(byte);
                    }
                },
                Token::Text(run) => {
                    if !state.skip {
                        out.pending.extend_from_slice(run);
                    }
                },
                Token::Newline => {},
            }
            destination_pending = false;
        }
        out.end_line();

        let mut builder = TextBuilder::new(Format::Rtf);
        if unbalanced || !stack.is_empty() {
            builder.warn("unbalanced groups; text extracted up to the damage");
        }
        if out.lost_surrogates > 0 {
            builder.warn(format!("{} unpaired \\u surrogate halves dropped", out.lost_surrogates));
        }
        for (index, line) in out.lines.iter().enumerate() {
            let line = line.strip_suffix('\t').unwrap_or(line);
            builder.push_line(line, Origin::Paragraph { index });
        }
        builder.trim_trailing_blank_lines();
        Ok(builder.finish())
    }
}
