use crate::error::ProtocolError;
use crate::types::ItemStack;
use std::io::Read;

/// Values that can be read off the wire.
pub trait Wire: Sized {
    fn decode(r: &mut impl Read) -> Result<Self, ProtocolError>;
}
/// Values that can be appended to an outgoing buffer.
pub trait ToWire {
    fn encode(&self, buf: &mut Vec<u8>);
}

impl<T: ToWire + ?Sized> ToWire for &T {
    fn encode(&self, buf: &mut Vec<u8>) {
        (**self).encode(buf)
    }
}

macro_rules! impl_wire {
    {} => {};
    {$t:ident $($rt:ident)*} => {
        impl<$t: Wire, $($rt: Wire),*> Wire for ($t,$($rt,)*) {
            fn decode(r: &mut impl Read) -> Result<Self, ProtocolError> {
                Ok(($t::decode(r)?, $($rt::decode(r)?,)*))
            }
        }
        #[allow(non_snake_case)]
        impl<$t: ToWire, $($rt: ToWire),*> ToWire for ($t,$($rt,)*) {
            fn encode(&self, buf: &mut Vec<u8>) {
                let ($t, $($rt,)*) = self;
                $t.encode(buf);
                $($rt.encode(buf);)*
            }
        }
        impl_wire!($($rt)*);
    }
}
impl_wire!(A B C D E F);

macro_rules! be {
    { $($i:ident)* } => {
        $(
            impl Wire for $i {
                fn decode(r: &mut impl Read) -> Result<Self, ProtocolError> {
                    let mut bytes = [0; core::mem::size_of::<$i>()];
                    r.read_exact(&mut bytes)?;
                    Ok($i::from_be_bytes(bytes))
                }
            }
            impl ToWire for $i {
                fn encode(&self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_be_bytes());
                }
            }
        )*
    }
}
be! { u8 i8 i16 i32 i64 f32 f64 }

impl Wire for bool {
    fn decode(r: &mut impl Read) -> Result<Self, ProtocolError> {
        match u8::decode(r)? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(ProtocolError::BadBool(b)),
        }
    }
}
impl ToWire for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }
}

/// Strings are a count of UTF-16 code units followed by the units, big-endian.
impl Wire for String {
    fn decode(r: &mut impl Read) -> Result<Self, ProtocolError> {
        let len = i16::decode(r)?;
        if len < 0 {
            return Err(ProtocolError::StringLength(len as i32));
        }
        let mut raw = vec![0; len as usize * 2];
        r.read_exact(&mut raw)?;
        let units = raw.chunks_exact(2).map(|u| u16::from_be_bytes([u[0], u[1]]));
        char::decode_utf16(units)
            .collect::<Result<String, _>>()
            .map_err(|_| ProtocolError::BadString)
    }
}
impl ToWire for str {
    fn encode(&self, buf: &mut Vec<u8>) {
        let units: Vec<u16> = self.encode_utf16().take(i16::MAX as usize).collect();
        (units.len() as i16).encode(buf);
        for unit in units {
            buf.extend_from_slice(&unit.to_be_bytes());
        }
    }
}
impl ToWire for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_str().encode(buf)
    }
}

/// Raw byte arrays carry an i32 length.
impl Wire for Vec<u8> {
    fn decode(r: &mut impl Read) -> Result<Self, ProtocolError> {
        let len = i32::decode(r)?;
        if len < 0 {
            return Err(ProtocolError::StringLength(len));
        }
        let mut bytes = Vec::new();
        (&mut *r).take(len as u64).read_to_end(&mut bytes)?;
        if bytes.len() != len as usize {
            return Err(ProtocolError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(bytes)
    }
}
impl ToWire for Vec<u8> {
    fn encode(&self, buf: &mut Vec<u8>) {
        (self.len() as i32).encode(buf);
        buf.extend_from_slice(self);
    }
}

/// An inventory slot: the item id, then count and damage only when an item is present.
impl Wire for Option<ItemStack> {
    fn decode(r: &mut impl Read) -> Result<Self, ProtocolError> {
        let id = i16::decode(r)?;
        if id < 0 {
            return Ok(None);
        }
        let (count, damage) = Wire::decode(r)?;
        Ok(Some(ItemStack { id, count, damage }))
    }
}
impl ToWire for Option<ItemStack> {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Some(item) => (item.id, item.count, item.damage).encode(buf),
            None => (-1i16).encode(buf),
        }
    }
}

/// A whole window's contents: an i16 slot count, then each slot.
impl Wire for Vec<Option<ItemStack>> {
    fn decode(r: &mut impl Read) -> Result<Self, ProtocolError> {
        let count = i16::decode(r)?;
        if count < 0 {
            return Err(ProtocolError::StringLength(count as i32));
        }
        (0..count).map(|_| Option::<ItemStack>::decode(r)).collect()
    }
}
impl ToWire for Vec<Option<ItemStack>> {
    fn encode(&self, buf: &mut Vec<u8>) {
        (self.len() as i16).encode(buf);
        for slot in self {
            slot.encode(buf);
        }
    }
}

/// Reads the id byte that starts every packet. Running out of input here is
/// a clean close rather than a truncated packet.
pub fn packet_id(r: &mut impl Read) -> Result<u8, ProtocolError> {
    let mut id = [0u8];
    loop {
        match r.read(&mut id) {
            Ok(0) => return Err(ProtocolError::EndOfStream),
            Ok(_) => return Ok(id[0]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}
