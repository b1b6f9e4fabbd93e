use crate::buffer::PAGE_SIZE;
use crate::error::{RoostError, RoostResult};
use crate::index::key::{IndexKey, KeyType};
use crate::index::page::{IndexMetaPage, InternalNode, LeafNode, RELATION_NAME_SIZE};
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::storage::heap_file::RecordId;

pub const RID_ENCODED_SIZE: usize = 8;

pub struct RidCodec;

impl RidCodec {
    pub fn encode(rid: &RecordId) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(RID_ENCODED_SIZE);
        bytes.extend(CommonCodec::encode_u32(rid.page_id));
        bytes.extend(CommonCodec::encode_u32(rid.slot_num));
        bytes
    }

    pub fn decode(bytes: &[u8]) -> RoostResult<DecodedData<RecordId>> {
        let mut left_bytes = bytes;
        let (page_id, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (slot_num, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        Ok((
            RecordId::new(page_id, slot_num),
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct IndexMetaPageCodec;

impl IndexMetaPageCodec {
    pub fn encode(meta: &IndexMetaPage) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PAGE_SIZE);
        let mut name = [0u8; RELATION_NAME_SIZE];
        let name_bytes = meta.relation_name.as_bytes();
        let name_len = name_bytes.len().min(RELATION_NAME_SIZE);
        name[..name_len].copy_from_slice(&name_bytes[..name_len]);
        bytes.extend_from_slice(&name);
        bytes.extend(CommonCodec::encode_u8(meta.key_type.to_u8()));
        bytes.extend(CommonCodec::encode_u32(meta.attr_byte_offset));
        bytes.extend(CommonCodec::encode_u32(meta.root_page_id));
        bytes.extend(CommonCodec::encode_u32(meta.leaf_max_size));
        bytes.extend(CommonCodec::encode_u32(meta.internal_max_size));
        bytes.resize(PAGE_SIZE, 0);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> RoostResult<DecodedData<IndexMetaPage>> {
        if bytes.len() != PAGE_SIZE {
            return Err(RoostError::Storage(format!(
                "metadata page size is {} instead of {}",
                bytes.len(),
                PAGE_SIZE
            )));
        }
        let mut left_bytes = bytes;
        let (name_raw, offset) = CommonCodec::decode_fixed_bytes(left_bytes, RELATION_NAME_SIZE)?;
        left_bytes = &left_bytes[offset..];
        let name_len = name_raw
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(RELATION_NAME_SIZE);
        let relation_name = String::from_utf8(name_raw[..name_len].to_vec())
            .map_err(|e| RoostError::Storage(format!("relation name is not utf-8: {}", e)))?;

        let (key_type_tag, offset) = CommonCodec::decode_u8(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (attr_byte_offset, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (root_page_id, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (leaf_max_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (internal_max_size, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        Ok((
            IndexMetaPage {
                relation_name,
                key_type: KeyType::from_u8(key_type_tag)?,
                attr_byte_offset,
                root_page_id,
                leaf_max_size,
                internal_max_size,
            },
            bytes.len() - left_bytes.len(),
        ))
    }
}

pub struct LeafNodeCodec;

impl LeafNodeCodec {
    pub fn encode<K: IndexKey>(node: &LeafNode<K>) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PAGE_SIZE);
        bytes.extend(CommonCodec::encode_u32(node.entries.len() as u32));
        bytes.extend(CommonCodec::encode_u32(node.next_page_id));
        for (key, rid) in node.entries.iter() {
            key.encode_into(&mut bytes);
            bytes.extend(RidCodec::encode(rid));
        }
        assert!(bytes.len() <= PAGE_SIZE);
        bytes.resize(PAGE_SIZE, 0);
        bytes
    }

    pub fn decode<K: IndexKey>(bytes: &[u8]) -> RoostResult<DecodedData<LeafNode<K>>> {
        if bytes.len() != PAGE_SIZE {
            return Err(RoostError::Storage(format!(
                "leaf page size is {} instead of {}",
                bytes.len(),
                PAGE_SIZE
            )));
        }
        let mut left_bytes = bytes;
        let (num_keys, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (next_page_id, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        let mut entries = Vec::with_capacity(num_keys as usize);
        for _ in 0..num_keys {
            let (key, offset) = K::decode(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            let (rid, offset) = RidCodec::decode(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            entries.push((key, rid));
        }
        Ok((
            LeafNode {
                next_page_id,
                entries,
            },
            PAGE_SIZE,
        ))
    }
}

pub struct InternalNodeCodec;

impl InternalNodeCodec {
    pub fn encode<K: IndexKey>(node: &InternalNode<K>) -> Vec<u8> {
        debug_assert_eq!(node.children.len(), node.keys.len() + 1);
        let mut bytes = Vec::with_capacity(PAGE_SIZE);
        bytes.extend(CommonCodec::encode_u32(node.level));
        bytes.extend(CommonCodec::encode_u32(node.keys.len() as u32));
        bytes.extend(CommonCodec::encode_u32(node.children[0]));
        for (key, child) in node.keys.iter().zip(node.children[1..].iter()) {
            key.encode_into(&mut bytes);
            bytes.extend(CommonCodec::encode_u32(*child));
        }
        assert!(bytes.len() <= PAGE_SIZE);
        bytes.resize(PAGE_SIZE, 0);
        bytes
    }

    pub fn decode<K: IndexKey>(bytes: &[u8]) -> RoostResult<DecodedData<InternalNode<K>>> {
        if bytes.len() != PAGE_SIZE {
            return Err(RoostError::Storage(format!(
                "internal page size is {} instead of {}",
                bytes.len(),
                PAGE_SIZE
            )));
        }
        let mut left_bytes = bytes;
        let (level, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (num_keys, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];
        let (first_child, offset) = CommonCodec::decode_u32(left_bytes)?;
        left_bytes = &left_bytes[offset..];

        let mut keys = Vec::with_capacity(num_keys as usize);
        let mut children = Vec::with_capacity(num_keys as usize + 1);
        children.push(first_child);
        for _ in 0..num_keys {
            let (key, offset) = K::decode(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            let (child, offset) = CommonCodec::decode_u32(left_bytes)?;
            left_bytes = &left_bytes[offset..];
            keys.push(key);
            children.push(child);
        }
        Ok((
            InternalNode {
                level,
                keys,
                children,
            },
            PAGE_SIZE,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::INVALID_PAGE_ID;
    use crate::index::key::Char10;

    #[test]
    fn meta_page_codec_roundtrip() {
        let meta =
            IndexMetaPage::try_new("employees", KeyType::Float64, 24, 2, 255, 340).unwrap();
        let (decoded, _) = IndexMetaPageCodec::decode(&IndexMetaPageCodec::encode(&meta)).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn leaf_page_codec_roundtrip() {
        let mut leaf = LeafNode::<i32>::new();
        leaf.next_page_id = 12;
        leaf.insert(3, RecordId::new(4, 0));
        leaf.insert(-9, RecordId::new(4, 1));
        let (decoded, _) = LeafNodeCodec::decode::<i32>(&LeafNodeCodec::encode(&leaf)).unwrap();
        assert_eq!(decoded, leaf);
    }

    #[test]
    fn internal_page_codec_roundtrip() {
        let node = InternalNode::<Char10> {
            level: 2,
            keys: vec![Char10::from("mango"), Char10::from("pear")],
            children: vec![3, 7, 11],
        };
        let (decoded, _) =
            InternalNodeCodec::decode::<Char10>(&InternalNodeCodec::encode(&node)).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn zeroed_page_decodes_to_empty_sentinel() {
        let (node, _) = InternalNodeCodec::decode::<i32>(&[0u8; PAGE_SIZE]).unwrap();
        assert_eq!(node.level, 0);
        assert!(node.keys.is_empty());
        assert_eq!(node.children, vec![INVALID_PAGE_ID]);
        assert!(node.is_empty_root());

        let (leaf, _) = LeafNodeCodec::decode::<i32>(&[0u8; PAGE_SIZE]).unwrap();
        assert!(leaf.entries.is_empty());
        assert_eq!(leaf.next_page_id, INVALID_PAGE_ID);
    }
}
