use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, BE};
use gshare_config::MSG_SIZE;

/// Write one length-prefixed text frame: a big-endian u32 byte count
/// followed by the payload tokens.
pub fn write_frame<W: Write>(w: &mut W, msg: &str) -> io::Result<()> {
    if msg.len() > MSG_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds the {} byte cap", msg.len(), MSG_SIZE),
        ));
    }
    w.write_u32::<BE>(msg.len() as u32)?;
    w.write_all(msg.as_bytes())?;
    w.flush()
}

/// Read one frame. Returns `Ok(None)` on a clean close before the length
/// prefix; a close mid-frame is an error.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Option<String>> {
    let len = match r.read_u32::<BE>() {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    if len > MSG_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("peer announced a {len} byte frame, cap is {MSG_SIZE}"),
        ));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame is not valid UTF-8"))
}
