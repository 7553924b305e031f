//! 키 기반 파티션 선택
//!
//! DJB 해시(`hash * 33 + byte`, 초기값 5381)를 계산하고 파티션 수로 나눈
//! 나머지를 사용합니다. 같은 키는 항상 같은 파티션으로 갑니다.
//!
//! 바이트는 부호 있는 값(`i8`)으로 부호 확장해 더합니다. 기존 수집기와
//! 같은 키가 같은 파티션에 놓이려면 ASCII 밖의 바이트도 같은 값이어야 합니다.

/// DJB 해시 초기값
const DJB_SEED: u32 = 5381;

/// 키의 DJB 해시를 계산합니다.
pub fn djb_hash(key: &[u8]) -> u32 {
    key.iter().fold(DJB_SEED, |hash, &byte| {
        (hash << 5).wrapping_add(hash).wrapping_add(byte as i8 as u32)
    })
}

/// 키가 속할 파티션을 선택합니다.
///
/// `partitions`가 0이면 0을 반환합니다.
pub fn select_partition(key: &[u8], partitions: u32) -> u32 {
    if partitions == 0 {
        return 0;
    }
    djb_hash(key) % partitions
}
