use crate::error::{CodecError, Result};

/// Deepest array/object nesting `skip_value` will follow.
pub const MAX_SKIP_DEPTH: usize = 512;

/// Bounds-checked read position over an immutable byte buffer.
///
/// All decoding goes through a cursor. Reading past the end yields
/// [`CodecError::UnexpectedEnd`] instead of touching memory it doesn't own.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// The next byte, without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Consume and return the next byte.
    pub fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Move forward `n` bytes, clamped to the end of the buffer.
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buf.len());
    }

    /// Sub-slice of the underlying buffer between two offsets.
    pub fn slice(&self, start: usize, end: usize) -> &'a [u8] {
        let end = end.min(self.buf.len());
        &self.buf[start.min(end)..end]
    }

    /// Skip JSON insignificant whitespace (space, tab, CR, LF).
    pub fn skip_space(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    /// Build the error for whatever sits at the current position.
    pub fn unexpected(&self, expected: &'static str) -> CodecError {
        match self.peek() {
            Some(found) => CodecError::UnexpectedByte {
                offset: self.pos,
                found,
                expected,
            },
            None => CodecError::UnexpectedEnd { offset: self.pos },
        }
    }

    /// Consume `byte` or fail.
    pub fn expect(&mut self, byte: u8, expected: &'static str) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Consume `literal` if the input starts with it. Leaves the cursor alone otherwise.
    pub fn match_literal(&mut self, literal: &[u8]) -> bool {
        if self.remaining().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    /// Match an object key of the form `"key":`, with optional whitespace.
    ///
    /// On a mismatch the cursor is restored to where it started. Only keys
    /// without escapes can be matched this way; that covers field names in
    /// hand-written [`Decodable`](crate::Decodable) impls.
    pub fn match_key(&mut self, key: &str) -> bool {
        let start = self.pos;
        self.skip_space();
        let matched = self.match_literal(b"\"")
            && self.match_literal(key.as_bytes())
            && self.match_literal(b"\"")
            && {
                self.skip_space();
                self.match_literal(b":")
            };
        if matched {
            self.skip_space();
        } else {
            self.pos = start;
        }
        matched
    }

    /// Require that only whitespace remains.
    pub fn finish(&mut self) -> Result<()> {
        self.skip_space();
        if self.is_at_end() {
            Ok(())
        } else {
            Err(CodecError::TrailingData { offset: self.pos })
        }
    }

    /// Skip over one complete value of any type.
    pub fn skip_value(&mut self) -> Result<()> {
        self.skip_value_at(0)
    }

    /// Skip one object member (`"key": value`) and the comma after it, if any.
    pub fn skip_member(&mut self) -> Result<()> {
        self.skip_space();
        self.read_string_bytes()?;
        self.skip_space();
        self.expect(b':', "':' after object key")?;
        self.skip_value()?;
        self.skip_space();
        if self.peek() == Some(b',') {
            self.pos += 1;
        }
        Ok(())
    }

    fn skip_value_at(&mut self, depth: usize) -> Result<()> {
        if depth >= MAX_SKIP_DEPTH {
            return Err(CodecError::NestingTooDeep {
                offset: self.pos,
                max: MAX_SKIP_DEPTH,
            });
        }
        self.skip_space();
        match self.peek() {
            Some(b'"') => self.read_string_bytes().map(drop),
            Some(b'[') => {
                self.pos += 1;
                self.skip_space();
                if self.match_literal(b"]") {
                    return Ok(());
                }
                loop {
                    self.skip_value_at(depth + 1)?;
                    self.skip_space();
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b']') => {
                            self.pos += 1;
                            return Ok(());
                        }
                        _ => return Err(self.unexpected("',' or ']'")),
                    }
                }
            }
            Some(b'{') => {
                self.pos += 1;
                self.skip_space();
                if self.match_literal(b"}") {
                    return Ok(());
                }
                loop {
                    self.skip_space();
                    self.read_string_bytes()?;
                    self.skip_space();
                    self.expect(b':', "':' after object key")?;
                    self.skip_value_at(depth + 1)?;
                    self.skip_space();
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b'}') => {
                            self.pos += 1;
                            return Ok(());
                        }
                        _ => return Err(self.unexpected("',' or '}'")),
                    }
                }
            }
            Some(b't') if self.match_literal(b"true") => Ok(()),
            Some(b'f') if self.match_literal(b"false") => Ok(()),
            Some(b'n') if self.match_literal(b"null") => Ok(()),
            Some(b'-' | b'0'..=b'9') => self.read_number_token().map(drop),
            _ => Err(self.unexpected("a JSON value")),
        }
    }

    /// Consume a JSON number token and return its bytes.
    ///
    /// Grammar: `-? digits ( . digits )? ( [eE] [+-]? digits )?`. Leading
    /// zeros are tolerated.
    pub fn read_number_token(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        self.match_literal(b"-");
        if self.skip_digits() == 0 {
            return Err(CodecError::InvalidNumber { offset: start });
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if self.skip_digits() == 0 {
                return Err(CodecError::InvalidNumber { offset: start });
            }
        }
        if let Some(b'e' | b'E') = self.peek() {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if self.skip_digits() == 0 {
                return Err(CodecError::InvalidNumber { offset: start });
            }
        }
        Ok(&self.buf[start..self.pos])
    }

    fn skip_digits(&mut self) -> usize {
        let start = self.pos;
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Consume a JSON string literal and return its unescaped bytes.
    ///
    /// Bytes >= 0x80 are copied through untouched, so malformed UTF-8 survives.
    /// Raw control bytes (including newline) inside the literal are rejected.
    pub fn read_string_bytes(&mut self) -> Result<Vec<u8>> {
        self.expect(b'"', "'\"'")?;
        let mut out = Vec::new();
        loop {
            let run_start = self.pos;
            while let Some(b) = self.peek() {
                if b == b'"' || b == b'\\' || b < 0x20 {
                    break;
                }
                self.pos += 1;
            }
            out.extend_from_slice(&self.buf[run_start..self.pos]);

            match self.bump() {
                Some(b'"') => return Ok(out),
                Some(b'\\') => self.read_escape(&mut out)?,
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.unexpected("string character"));
                }
                None => return Err(CodecError::UnexpectedEnd { offset: self.pos }),
            }
        }
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let offset = self.pos - 1;
        let simple = match self.bump() {
            Some(b'"') => b'"',
            Some(b'\\') => b'\\',
            Some(b'/') => b'/',
            Some(b'b') => 0x08,
            Some(b'f') => 0x0c,
            Some(b'n') => b'\n',
            Some(b'r') => b'\r',
            Some(b't') => b'\t',
            Some(b'u') => {
                let ch = self.read_unicode_escape(offset)?;
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
                return Ok(());
            }
            Some(_) => return Err(CodecError::InvalidEscape { offset }),
            None => return Err(CodecError::UnexpectedEnd { offset: self.pos }),
        };
        out.push(simple);
        Ok(())
    }

    fn read_unicode_escape(&mut self, offset: usize) -> Result<char> {
        let first = self.read_hex4(offset)?;
        let code = match first {
            0xD800..=0xDBFF => {
                if !self.match_literal(b"\\u") {
                    return Err(CodecError::InvalidEscape { offset });
                }
                let second = self.read_hex4(offset)?;
                if !(0xDC00..=0xDFFF).contains(&second) {
                    return Err(CodecError::InvalidEscape { offset });
                }
                0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00)
            }
            0xDC00..=0xDFFF => return Err(CodecError::InvalidEscape { offset }),
            other => other,
        };
        char::from_u32(code).ok_or(CodecError::InvalidEscape { offset })
    }

    fn read_hex4(&mut self, offset: usize) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|b| char::from(b).to_digit(16))
                .ok_or(CodecError::InvalidEscape { offset })?;
            value = (value << 4) | digit;
        }
        Ok(value)
    }
}
