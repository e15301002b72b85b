//! 9P2000 wire format.
//!
//! Every message is a little-endian frame `size[4] type[1] tag[2] body`,
//! where `size` counts the whole frame including itself.  Strings are
//! `len[2]` followed by that many bytes of UTF-8.  Only the messages wmii
//! traffic needs are implemented:
//!
//! | T-message  | R-message  | Purpose                        |
//! |------------|------------|--------------------------------|
//! | `Tversion` | `Rversion` | Negotiate protocol and msize   |
//! | `Tattach`  | `Rattach`  | Establish the root fid         |
//! | `Twalk`    | `Rwalk`    | Derive a fid for a path        |
//! | `Topen`    | `Ropen`    | Prepare a fid for I/O          |
//! | `Tcreate`  | `Rcreate`  | Create a file in a directory   |
//! | `Tread`    | `Rread`    | Read at an offset              |
//! | `Twrite`   | `Rwrite`   | Write at an offset             |
//! | `Tclunk`   | `Rclunk`   | Release a fid                  |
//!
//! Any R-message may be replaced by `Rerror` carrying a diagnostic string.
//! Reading a directory returns a stream of [`Stat`] records; see
//! [`parse_dir`].

use super::NinepError;
use std::io::{Read, Write};

/// Tag of `Tversion`, which sits outside the normal tag space.
pub const NOTAG: u16 = !0;
/// Fid meaning "no fid" (the afid of an unauthenticated attach).
pub const NOFID: u32 = !0;
/// The only protocol version we speak.
pub const VERSION: &str = "9P2000";
/// Maximum message size offered during version negotiation.
pub const MAX_MSIZE: u32 = 8192;
/// Bytes of a `Twrite`/`Rread` frame that are not payload.
pub const IOHDRSZ: u32 = 24;
/// Maximum path elements in a single `Twalk`.
pub const MAXWELEM: usize = 16;

/// Open for reading.
pub const OREAD: u8 = 0;
/// Open for writing.
pub const OWRITE: u8 = 1;

/// Qid `kind` bit marking a directory.
pub const QTDIR: u8 = 0x80;
/// Stat `mode` bit marking a directory.
pub const DMDIR: u32 = 1 << 31;

const TVERSION: u8 = 100;
const RVERSION: u8 = 101;
const TATTACH: u8 = 104;
const RATTACH: u8 = 105;
const RERROR: u8 = 107;
const TWALK: u8 = 110;
const RWALK: u8 = 111;
const TOPEN: u8 = 112;
const ROPEN: u8 = 113;
const TCREATE: u8 = 114;
const RCREATE: u8 = 115;
const TREAD: u8 = 116;
const RREAD: u8 = 117;
const TWRITE: u8 = 118;
const RWRITE: u8 = 119;
const TCLUNK: u8 = 120;
const RCLUNK: u8 = 121;

/// Server-side identity of a file: `kind[1] vers[4] path[8]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Qid {
    pub kind: u8,
    pub vers: u32,
    pub path: u64,
}

/// A machine-independent stat record, one per entry when reading a
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub typ: u16,
    pub dev: u32,
    pub qid: Qid,
    pub mode: u32,
    pub atime: u32,
    pub mtime: u32,
    pub length: u64,
    pub name: String,
    pub uid: String,
    pub gid: String,
    pub muid: String,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.mode & DMDIR != 0
    }

    /// Decode one stat record, consuming it from `b`.
    ///
    /// The leading `size[2]` field counts the bytes that follow it, so a
    /// record can be skipped without understanding its contents.
    pub fn decode(b: &mut &[u8]) -> Result<Stat, NinepError> {
        let size = get_u16(b)? as usize;
        let mut body = get_bytes(b, size)?;
        let st = Stat {
            typ: get_u16(&mut body)?,
            dev: get_u32(&mut body)?,
            qid: get_qid(&mut body)?,
            mode: get_u32(&mut body)?,
            atime: get_u32(&mut body)?,
            mtime: get_u32(&mut body)?,
            length: get_u64(&mut body)?,
            name: get_str(&mut body)?,
            uid: get_str(&mut body)?,
            gid: get_str(&mut body)?,
            muid: get_str(&mut body)?,
        };
        if !body.is_empty() {
            return Err(NinepError::Malformed("trailing bytes in stat record"));
        }
        Ok(st)
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut body = Vec::with_capacity(64);
        put_u16(&mut body, self.typ);
        put_u32(&mut body, self.dev);
        put_qid(&mut body, self.qid);
        put_u32(&mut body, self.mode);
        put_u32(&mut body, self.atime);
        put_u32(&mut body, self.mtime);
        put_u64(&mut body, self.length);
        put_str(&mut body, &self.name);
        put_str(&mut body, &self.uid);
        put_str(&mut body, &self.gid);
        put_str(&mut body, &self.muid);
        put_u16(out, body.len() as u16);
        out.extend_from_slice(&body);
    }
}

/// Parse the concatenated stat records returned by reading a directory.
///
/// `data` must hold complete records: callers should read the directory to
/// EOF before parsing, since a record may straddle two read chunks.
pub fn parse_dir(data: &[u8]) -> Result<Vec<Stat>, NinepError> {
    let mut b = data;
    let mut entries = Vec::new();
    while !b.is_empty() {
        entries.push(Stat::decode(&mut b)?);
    }
    Ok(entries)
}

/// One 9P message, minus its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Tversion { msize: u32, version: String },
    Rversion { msize: u32, version: String },
    Tattach { fid: u32, afid: u32, uname: String, aname: String },
    Rattach { qid: Qid },
    Rerror { ename: String },
    Twalk { fid: u32, newfid: u32, names: Vec<String> },
    Rwalk { qids: Vec<Qid> },
    Topen { fid: u32, mode: u8 },
    Ropen { qid: Qid, iounit: u32 },
    Tcreate { fid: u32, name: String, perm: u32, mode: u8 },
    Rcreate { qid: Qid, iounit: u32 },
    Tread { fid: u32, offset: u64, count: u32 },
    Rread { data: Vec<u8> },
    Twrite { fid: u32, offset: u64, data: Vec<u8> },
    Rwrite { count: u32 },
    Tclunk { fid: u32 },
    Rclunk,
}

impl Message {
    fn type_byte(&self) -> u8 {
        match self {
            Message::Tversion { .. } => TVERSION,
            Message::Rversion { .. } => RVERSION,
            Message::Tattach { .. } => TATTACH,
            Message::Rattach { .. } => RATTACH,
            Message::Rerror { .. } => RERROR,
            Message::Twalk { .. } => TWALK,
            Message::Rwalk { .. } => RWALK,
            Message::Topen { .. } => TOPEN,
            Message::Ropen { .. } => ROPEN,
            Message::Tcreate { .. } => TCREATE,
            Message::Rcreate { .. } => RCREATE,
            Message::Tread { .. } => TREAD,
            Message::Rread { .. } => RREAD,
            Message::Twrite { .. } => TWRITE,
            Message::Rwrite { .. } => RWRITE,
            Message::Tclunk { .. } => TCLUNK,
            Message::Rclunk => RCLUNK,
        }
    }

    /// Human-readable message name, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Tversion { .. } => "Tversion",
            Message::Rversion { .. } => "Rversion",
            Message::Tattach { .. } => "Tattach",
            Message::Rattach { .. } => "Rattach",
            Message::Rerror { .. } => "Rerror",
            Message::Twalk { .. } => "Twalk",
            Message::Rwalk { .. } => "Rwalk",
            Message::Topen { .. } => "Topen",
            Message::Ropen { .. } => "Ropen",
            Message::Tcreate { .. } => "Tcreate",
            Message::Rcreate { .. } => "Rcreate",
            Message::Tread { .. } => "Tread",
            Message::Rread { .. } => "Rread",
            Message::Twrite { .. } => "Twrite",
            Message::Rwrite { .. } => "Rwrite",
            Message::Tclunk { .. } => "Tclunk",
            Message::Rclunk => "Rclunk",
        }
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        match self {
            Message::Tversion { msize, version } | Message::Rversion { msize, version } => {
                put_u32(out, *msize);
                put_str(out, version);
            }
            Message::Tattach {
                fid,
                afid,
                uname,
                aname,
            } => {
                put_u32(out, *fid);
                put_u32(out, *afid);
                put_str(out, uname);
                put_str(out, aname);
            }
            Message::Rattach { qid } => put_qid(out, *qid),
            Message::Rerror { ename } => put_str(out, ename),
            Message::Twalk { fid, newfid, names } => {
                put_u32(out, *fid);
                put_u32(out, *newfid);
                put_u16(out, names.len() as u16);
                for name in names {
                    put_str(out, name);
                }
            }
            Message::Rwalk { qids } => {
                put_u16(out, qids.len() as u16);
                for qid in qids {
                    put_qid(out, *qid);
                }
            }
            Message::Topen { fid, mode } => {
                put_u32(out, *fid);
                out.push(*mode);
            }
            Message::Ropen { qid, iounit } => {
                put_qid(out, *qid);
                put_u32(out, *iounit);
            }
            Message::Tcreate {
                fid,
                name,
                perm,
                mode,
            } => {
                put_u32(out, *fid);
                put_str(out, name);
                put_u32(out, *perm);
                out.push(*mode);
            }
            Message::Rcreate { qid, iounit } => {
                put_qid(out, *qid);
                put_u32(out, *iounit);
            }
            Message::Tread { fid, offset, count } => {
                put_u32(out, *fid);
                put_u64(out, *offset);
                put_u32(out, *count);
            }
            Message::Rread { data } => {
                put_u32(out, data.len() as u32);
                out.extend_from_slice(data);
            }
            Message::Twrite { fid, offset, data } => {
                put_u32(out, *fid);
                put_u64(out, *offset);
                put_u32(out, data.len() as u32);
                out.extend_from_slice(data);
            }
            Message::Rwrite { count } => put_u32(out, *count),
            Message::Tclunk { fid } => put_u32(out, *fid),
            Message::Rclunk => {}
        }
    }

    fn decode_body(typ: u8, b: &mut &[u8]) -> Result<Message, NinepError> {
        let msg = match typ {
            TVERSION => Message::Tversion {
                msize: get_u32(b)?,
                version: get_str(b)?,
            },
            RVERSION => Message::Rversion {
                msize: get_u32(b)?,
                version: get_str(b)?,
            },
            TATTACH => Message::Tattach {
                fid: get_u32(b)?,
                afid: get_u32(b)?,
                uname: get_str(b)?,
                aname: get_str(b)?,
            },
            RATTACH => Message::Rattach { qid: get_qid(b)? },
            RERROR => Message::Rerror { ename: get_str(b)? },
            TWALK => {
                let fid = get_u32(b)?;
                let newfid = get_u32(b)?;
                let n = get_u16(b)? as usize;
                let mut names = Vec::with_capacity(n);
                for _ in 0..n {
                    names.push(get_str(b)?);
                }
                Message::Twalk { fid, newfid, names }
            }
            RWALK => {
                let n = get_u16(b)? as usize;
                let mut qids = Vec::with_capacity(n);
                for _ in 0..n {
                    qids.push(get_qid(b)?);
                }
                Message::Rwalk { qids }
            }
            TOPEN => Message::Topen {
                fid: get_u32(b)?,
                mode: get_u8(b)?,
            },
            ROPEN => Message::Ropen {
                qid: get_qid(b)?,
                iounit: get_u32(b)?,
            },
            TCREATE => Message::Tcreate {
                fid: get_u32(b)?,
                name: get_str(b)?,
                perm: get_u32(b)?,
                mode: get_u8(b)?,
            },
            RCREATE => Message::Rcreate {
                qid: get_qid(b)?,
                iounit: get_u32(b)?,
            },
            TREAD => Message::Tread {
                fid: get_u32(b)?,
                offset: get_u64(b)?,
                count: get_u32(b)?,
            },
            RREAD => {
                let n = get_u32(b)? as usize;
                Message::Rread {
                    data: get_bytes(b, n)?.to_vec(),
                }
            }
            TWRITE => {
                let fid = get_u32(b)?;
                let offset = get_u64(b)?;
                let n = get_u32(b)? as usize;
                Message::Twrite {
                    fid,
                    offset,
                    data: get_bytes(b, n)?.to_vec(),
                }
            }
            RWRITE => Message::Rwrite { count: get_u32(b)? },
            TCLUNK => Message::Tclunk { fid: get_u32(b)? },
            RCLUNK => Message::Rclunk,
            _ => return Err(NinepError::Malformed("unknown message type")),
        };
        Ok(msg)
    }
}

/// Frame `msg` with the given tag and write it to `w`.
pub fn write_message<W: Write>(w: &mut W, tag: u16, msg: &Message) -> Result<(), NinepError> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&[0; 4]);
    buf.push(msg.type_byte());
    put_u16(&mut buf, tag);
    msg.encode_body(&mut buf);
    let size = buf.len() as u32;
    buf[..4].copy_from_slice(&size.to_le_bytes());
    w.write_all(&buf)?;
    Ok(())
}

/// Read one framed message from `r`.
///
/// Frames larger than `max_size` are rejected rather than buffered, so a
/// confused peer cannot make us allocate unbounded memory.
pub fn read_message<R: Read>(r: &mut R, max_size: u32) -> Result<(u16, Message), NinepError> {
    let mut sz = [0u8; 4];
    r.read_exact(&mut sz)?;
    let size = u32::from_le_bytes(sz);
    if size < 7 {
        return Err(NinepError::Malformed("frame shorter than its header"));
    }
    if size > max_size {
        return Err(NinepError::Malformed("frame exceeds negotiated msize"));
    }
    let mut buf = vec![0u8; size as usize - 4];
    r.read_exact(&mut buf)?;
    let typ = buf[0];
    let tag = u16::from_le_bytes([buf[1], buf[2]]);
    let mut body = &buf[3..];
    let msg = Message::decode_body(typ, &mut body)?;
    if !body.is_empty() {
        return Err(NinepError::Malformed("trailing bytes after message body"));
    }
    Ok((tag, msg))
}

//  Wire primitives

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    // Strings long enough to overflow len[2] cannot be produced by the
    // paths and control lines this client sends.
    debug_assert!(s.len() <= u16::MAX as usize);
    put_u16(out, s.len() as u16);
    out.extend_from_slice(s.as_bytes());
}

fn put_qid(out: &mut Vec<u8>, qid: Qid) {
    out.push(qid.kind);
    put_u32(out, qid.vers);
    put_u64(out, qid.path);
}

fn get_bytes<'a>(b: &mut &'a [u8], n: usize) -> Result<&'a [u8], NinepError> {
    if b.len() < n {
        return Err(NinepError::Malformed("truncated message"));
    }
    let (head, rest) = b.split_at(n);
    *b = rest;
    Ok(head)
}

fn get_u8(b: &mut &[u8]) -> Result<u8, NinepError> {
    Ok(get_bytes(b, 1)?[0])
}

fn get_u16(b: &mut &[u8]) -> Result<u16, NinepError> {
    let raw = get_bytes(b, 2)?;
    Ok(u16::from_le_bytes([raw[0], raw[1]]))
}

fn get_u32(b: &mut &[u8]) -> Result<u32, NinepError> {
    let raw = get_bytes(b, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn get_u64(b: &mut &[u8]) -> Result<u64, NinepError> {
    let raw = get_bytes(b, 8)?;
    let mut le = [0u8; 8];
    le.copy_from_slice(raw);
    Ok(u64::from_le_bytes(le))
}

fn get_str(b: &mut &[u8]) -> Result<String, NinepError> {
    let n = get_u16(b)? as usize;
    let raw = get_bytes(b, n)?;
    String::from_utf8(raw.to_vec()).map_err(|_| NinepError::Malformed("string is not valid UTF-8"))
}

fn get_qid(b: &mut &[u8]) -> Result<Qid, NinepError> {
    Ok(Qid {
        kind: get_u8(b)?,
        vers: get_u32(b)?,
        path: get_u64(b)?,
    })
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_frame_layout() {
        let mut buf = Vec::new();
        write_message(
            &mut buf,
            NOTAG,
            &Message::Tversion {
                msize: 8192,
                version: VERSION.into(),
            },
        )
        .unwrap();
        #[rustfmt::skip]
        assert_eq!(
            buf,
            [
                19, 0, 0, 0,            // size
                100,                    // Tversion
                255, 255,               // NOTAG
                0, 32, 0, 0,            // msize 8192
                6, 0, b'9', b'P', b'2', b'0', b'0', b'0',
            ]
        );
    }

    #[test]
    fn walk_round_trip() {
        let msg = Message::Twalk {
            fid: 1,
            newfid: 2,
            names: vec!["client".into(), "0x2200002".into()],
        };
        let mut buf = Vec::new();
        write_message(&mut buf, 7, &msg).unwrap();
        let (tag, decoded) = read_message(&mut &buf[..], MAX_MSIZE).unwrap();
        assert_eq!(tag, 7);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn error_reply_decodes() {
        let mut buf = Vec::new();
        write_message(
            &mut buf,
            3,
            &Message::Rerror {
                ename: "file not found".into(),
            },
        )
        .unwrap();
        let (tag, decoded) = read_message(&mut &buf[..], MAX_MSIZE).unwrap();
        assert_eq!(tag, 3);
        assert_eq!(
            decoded,
            Message::Rerror {
                ename: "file not found".into()
            }
        );
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let mut buf = Vec::new();
        write_message(&mut buf, 1, &Message::Tclunk { fid: 9 }).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            read_message(&mut &buf[..], MAX_MSIZE),
            Err(NinepError::Io(_))
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let buf = u32::MAX.to_le_bytes();
        assert!(matches!(
            read_message(&mut &buf[..], MAX_MSIZE),
            Err(NinepError::Malformed(_))
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = Vec::new();
        write_message(&mut buf, 1, &Message::Rclunk).unwrap();
        buf.push(0xff);
        let size = buf.len() as u32;
        buf[..4].copy_from_slice(&size.to_le_bytes());
        assert!(matches!(
            read_message(&mut &buf[..], MAX_MSIZE),
            Err(NinepError::Malformed(_))
        ));
    }

    fn sample_stat(name: &str, kind: u8, mode: u32) -> Stat {
        Stat {
            typ: 0,
            dev: 0,
            qid: Qid {
                kind,
                vers: 0,
                path: 42,
            },
            mode,
            atime: 1_300_000_000,
            mtime: 1_300_000_000,
            length: 0,
            name: name.into(),
            uid: "glenda".into(),
            gid: "glenda".into(),
            muid: "glenda".into(),
        }
    }

    #[test]
    fn stat_round_trip() {
        let st = sample_stat("props", 0, 0o644);
        let mut buf = Vec::new();
        st.encode(&mut buf);
        let mut b = &buf[..];
        assert_eq!(Stat::decode(&mut b).unwrap(), st);
        assert!(b.is_empty());
    }

    #[test]
    fn parse_dir_splits_entries() {
        let mut buf = Vec::new();
        sample_stat("sel", QTDIR, DMDIR | 0o755).encode(&mut buf);
        sample_stat("0x2200002", QTDIR, DMDIR | 0o755).encode(&mut buf);
        let entries = parse_dir(&buf).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "sel");
        assert_eq!(entries[1].name, "0x2200002");
        assert!(entries.iter().all(Stat::is_dir));
    }

    #[test]
    fn parse_dir_rejects_garbage() {
        let mut buf = Vec::new();
        sample_stat("sel", QTDIR, DMDIR | 0o755).encode(&mut buf);
        buf.extend_from_slice(&[7, 0, 1]);
        assert!(parse_dir(&buf).is_err());
    }
}
