//! Builds small in-memory archives for the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::{write::ZlibEncoder, Compression};
use nx_archive::Header;

pub enum TestValue {
    Empty,
    Integer(i32),
    Real(f64),
    Text(&'static str),
    TextId(u32),
    Point(i32, i32),
    Image(u32),
    Audio(u32),
    Link(u32),
    /// A raw tag byte followed by raw payload bytes
    Raw(u8, Vec<u8>),
}

pub struct TestNode {
    pub name: String,
    pub value: TestValue,
    pub children: Vec<TestNode>,
}

pub fn node(name: impl Into<String>, value: TestValue) -> TestNode {
    TestNode {
        name: name.into(),
        value,
        children: Vec::new(),
    }
}

impl TestNode {
    pub fn with(mut self, children: Vec<TestNode>) -> Self {
        self.children = children;
        self
    }

    fn count(&self) -> u32 {
        1 + self.children.iter().map(TestNode::count).sum::<u32>()
    }
}

#[derive(Default)]
pub struct ArchiveBuilder {
    strings: Vec<String>,
    images: Vec<Vec<u8>>,
    audio: Vec<Vec<u8>>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, text: &str) -> u32 {
        match self.strings.iter().position(|s| s == text) {
            Some(id) => id as u32,
            None => {
                self.strings.push(text.to_owned());
                self.strings.len() as u32 - 1
            }
        }
    }

    /// Adds a zlib compressed image entry
    pub fn image(&mut self, width: u16, height: u16, format: u16, pixels: &[u8]) -> u32 {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(pixels).unwrap();
        let compressed = encoder.finish().unwrap();

        self.raw_image(width, height, format, &compressed)
    }

    /// Adds an image entry holding `data` as its compressed payload
    pub fn raw_image(&mut self, width: u16, height: u16, format: u16, data: &[u8]) -> u32 {
        let mut entry = Vec::new();
        entry.write_u16::<LittleEndian>(width).unwrap();
        entry.write_u16::<LittleEndian>(height).unwrap();
        entry.write_u16::<LittleEndian>(format).unwrap();
        entry.write_u32::<LittleEndian>(data.len() as u32).unwrap();
        entry.extend_from_slice(data);

        self.images.push(entry);
        self.images.len() as u32 - 1
    }

    pub fn audio(&mut self, data: &[u8]) -> u32 {
        let mut entry = Vec::new();
        entry.write_u32::<LittleEndian>(data.len() as u32).unwrap();
        entry.extend_from_slice(data);

        self.audio.push(entry);
        self.audio.len() as u32 - 1
    }

    pub fn build(mut self, root: &TestNode) -> Vec<u8> {
        let mut nodes = Vec::new();
        self.encode(root, &mut nodes);

        let node_offset = Header::SIZE;
        let string_offset = node_offset + nodes.len();
        let strings = table(string_offset, &self.strings, |out, s| {
            out.write_u16::<LittleEndian>(s.len() as u16).unwrap();
            out.extend_from_slice(s.as_bytes());
        });

        let image_offset = string_offset + strings.len();
        let images = table(image_offset, &self.images, |out, e| out.extend_from_slice(e));

        let audio_offset = image_offset + images.len();
        let audio = table(audio_offset, &self.audio, |out, e| out.extend_from_slice(e));

        let header = Header {
            node_count: root.count(),
            node_offset: node_offset as i64,
            string_count: self.strings.len() as u32,
            string_offset: string_offset as i64,
            image_count: self.images.len() as u32,
            image_offset: image_offset as i64,
            audio_count: self.audio.len() as u32,
            audio_offset: audio_offset as i64,
        };

        let mut out = Vec::new();
        header.write(&mut Cursor::new(&mut out)).unwrap();
        out.extend_from_slice(&nodes);
        out.extend_from_slice(&strings);
        out.extend_from_slice(&images);
        out.extend_from_slice(&audio);
        out
    }

    fn encode(&mut self, node: &TestNode, out: &mut Vec<u8>) {
        let name = self.intern(&node.name);
        out.write_u32::<LittleEndian>(name).unwrap();

        let has_children = if node.children.is_empty() { 0x00 } else { 0x80 };
        let mut payload = Vec::new();
        let tag = match &node.value {
            TestValue::Empty => 0,
            TestValue::Integer(v) => {
                payload.write_i32::<LittleEndian>(*v).unwrap();
                1
            }
            TestValue::Real(v) => {
                payload.write_f64::<LittleEndian>(*v).unwrap();
                2
            }
            TestValue::Text(text) => {
                let id = self.intern(text);
                payload.write_u32::<LittleEndian>(id).unwrap();
                3
            }
            TestValue::TextId(id) => {
                payload.write_u32::<LittleEndian>(*id).unwrap();
                3
            }
            TestValue::Point(x, y) => {
                payload.write_i32::<LittleEndian>(*x).unwrap();
                payload.write_i32::<LittleEndian>(*y).unwrap();
                4
            }
            TestValue::Image(id) => {
                payload.write_u32::<LittleEndian>(*id).unwrap();
                5
            }
            TestValue::Audio(id) => {
                payload.write_u32::<LittleEndian>(*id).unwrap();
                6
            }
            TestValue::Link(id) => {
                payload.write_u32::<LittleEndian>(*id).unwrap();
                7
            }
            TestValue::Raw(tag, bytes) => {
                payload.extend_from_slice(bytes);
                *tag
            }
        };

        out.push(tag | has_children);
        out.extend_from_slice(&payload);

        if !node.children.is_empty() {
            out.write_u16::<LittleEndian>(node.children.len() as u16)
                .unwrap();
            for child in &node.children {
                self.encode(child, out);
            }
        }
    }
}

/// An offset table for `entries` placed at `offset`, followed by the entries themselves
fn table<T>(offset: usize, entries: &[T], mut write: impl FnMut(&mut Vec<u8>, &T)) -> Vec<u8> {
    let mut body = Vec::new();
    let mut offsets = Vec::with_capacity(entries.len());
    let data_start = offset + entries.len() * 8;

    for entry in entries {
        offsets.push((data_start + body.len()) as u64);
        write(&mut body, entry);
    }

    let mut out = Vec::with_capacity(entries.len() * 8 + body.len());
    for o in offsets {
        out.write_u64::<LittleEndian>(o).unwrap();
    }
    out.extend_from_slice(&body);
    out
}

/// The tree most tests run against
///
/// ```text
/// /
/// ├── int     -17
/// ├── real    3.5
/// ├── point   (10, 20)
/// ├── text    "hello"
/// ├── a
/// │   └── b   42
/// ├── image   image 0
/// ├── sound   audio 0
/// └── alias   link to /a/b
/// ```
pub fn sample() -> Vec<u8> {
    let mut builder = ArchiveBuilder::new();
    // "hello" gets string id 0
    builder.intern("hello");
    let image = builder.image(2, 2, 2, &[0x11; 16]);
    let audio = builder.audio(b"RIFF....WAVE");

    builder.build(&node("", TestValue::Empty).with(vec![
        node("int", TestValue::Integer(-17)),
        node("real", TestValue::Real(3.5)),
        node("point", TestValue::Point(10, 20)),
        node("text", TestValue::Text("hello")),
        node("a", TestValue::Empty).with(vec![node("b", TestValue::Integer(42))]),
        node("image", TestValue::Image(image)),
        node("sound", TestValue::Audio(audio)),
        node("alias", TestValue::Link(6)),
    ]))
}
