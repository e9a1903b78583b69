//! Structural impls for optional, owning and collection types.
//!
//! Every impl here is defined purely in terms of the element type's own
//! size/write/read, so containers nest to any depth.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::codec::{Decodable, Encodable};
use crate::cursor::Cursor;
use crate::error::Result;

impl<T: Encodable> Encodable for Option<T> {
    fn json_size(&self) -> usize {
        match self {
            Some(value) => value.json_size(),
            None => 4,
        }
    }

    fn write_json(&self, out: &mut BytesMut) {
        match self {
            Some(value) => value.write_json(out),
            None => out.put_slice(b"null"),
        }
    }
}

impl<T: Decodable> Decodable for Option<T> {
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
        cur.skip_space();
        if cur.match_literal(b"null") {
            Ok(None)
        } else {
            T::read_json(cur).map(Some)
        }
    }
}

impl<T: Encodable + ?Sized> Encodable for Box<T> {
    fn json_size(&self) -> usize {
        (**self).json_size()
    }

    fn write_json(&self, out: &mut BytesMut) {
        (**self).write_json(out);
    }
}

impl<T: Decodable> Decodable for Box<T> {
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
        T::read_json(cur).map(Box::new)
    }
}

impl<T: Encodable + ?Sized> Encodable for Arc<T> {
    fn json_size(&self) -> usize {
        (**self).json_size()
    }

    fn write_json(&self, out: &mut BytesMut) {
        (**self).write_json(out);
    }
}

impl<T: Decodable> Decodable for Arc<T> {
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
        T::read_json(cur).map(Arc::new)
    }
}

fn seq_json_size<'a, T, I>(items: I) -> usize
where
    T: Encodable + 'a,
    I: ExactSizeIterator<Item = &'a T>,
{
    // Brackets plus one separator per element; one more than needed.
    2 + items.len() + items.map(T::json_size).sum::<usize>()
}

fn write_seq<'a, T, I>(items: I, out: &mut BytesMut)
where
    T: Encodable + 'a,
    I: Iterator<Item = &'a T>,
{
    out.put_u8(b'[');
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.put_u8(b',');
        }
        item.write_json(out);
    }
    out.put_u8(b']');
}

/// Read a JSON array, handing each element to `push` in order.
fn read_seq<T: Decodable>(cur: &mut Cursor<'_>, mut push: impl FnMut(T)) -> Result<()> {
    cur.skip_space();
    cur.expect(b'[', "'['")?;
    cur.skip_space();
    if cur.match_literal(b"]") {
        return Ok(());
    }
    loop {
        push(T::read_json(cur)?);
        cur.skip_space();
        match cur.peek() {
            Some(b',') => cur.advance(1),
            Some(b']') => {
                cur.advance(1);
                return Ok(());
            }
            _ => return Err(cur.unexpected("',' or ']'")),
        }
    }
}

impl<T: Encodable> Encodable for [T] {
    fn json_size(&self) -> usize {
        seq_json_size(self.iter())
    }

    fn write_json(&self, out: &mut BytesMut) {
        write_seq(self.iter(), out);
    }
}

impl<T: Encodable, const N: usize> Encodable for [T; N] {
    fn json_size(&self) -> usize {
        self.as_slice().json_size()
    }

    fn write_json(&self, out: &mut BytesMut) {
        self.as_slice().write_json(out);
    }
}

impl<T: Encodable> Encodable for Vec<T> {
    fn json_size(&self) -> usize {
        self.as_slice().json_size()
    }

    fn write_json(&self, out: &mut BytesMut) {
        self.as_slice().write_json(out);
    }
}

impl<T: Decodable> Decodable for Vec<T> {
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut items = Vec::new();
        read_seq(cur, |item| items.push(item))?;
        Ok(items)
    }
}

impl<T: Encodable> Encodable for VecDeque<T> {
    fn json_size(&self) -> usize {
        seq_json_size(self.iter())
    }

    fn write_json(&self, out: &mut BytesMut) {
        write_seq(self.iter(), out);
    }
}

impl<T: Decodable> Decodable for VecDeque<T> {
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut items = VecDeque::new();
        read_seq(cur, |item| items.push_back(item))?;
        Ok(items)
    }
}

impl<V: Encodable> Encodable for BTreeMap<String, V> {
    fn json_size(&self) -> usize {
        // Braces, plus ':' and ',' per member.
        2 + self
            .iter()
            .map(|(key, value)| key.json_size() + value.json_size() + 2)
            .sum::<usize>()
    }

    fn write_json(&self, out: &mut BytesMut) {
        out.put_u8(b'{');
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                out.put_u8(b',');
            }
            key.write_json(out);
            out.put_u8(b':');
            value.write_json(out);
        }
        out.put_u8(b'}');
    }
}

impl<V: Decodable> Decodable for BTreeMap<String, V> {
    /// Repeated keys are not an error: the last occurrence wins.
    fn read_json(cur: &mut Cursor<'_>) -> Result<Self> {
        cur.skip_space();
        cur.expect(b'{', "'{'")?;
        let mut map = BTreeMap::new();
        cur.skip_space();
        if cur.match_literal(b"}") {
            return Ok(map);
        }
        loop {
            let key = String::read_json(cur)?;
            cur.skip_space();
            cur.expect(b':', "':' after object key")?;
            let value = V::read_json(cur)?;
            map.insert(key, value);
            cur.skip_space();
            match cur.peek() {
                Some(b',') => cur.advance(1),
                Some(b'}') => {
                    cur.advance(1);
                    return Ok(map);
                }
                _ => return Err(cur.unexpected("',' or '}'")),
            }
        }
    }
}
