//! シンボル解決機能

use crate::DwarfLoader;

/// シンボル情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// マングルされたシンボル名
    pub name: String,
    /// デマングルされたシンボル名（ハッシュ部分を除いた可読な形式）
    pub demangled_name: String,
    pub address: u64,
    pub size: u64,
}

impl Symbol {
    /// シンボルを作成し、デマングルされた名前を設定する
    pub fn new(name: String, address: u64, size: u64) -> Self {
        let demangled_name = demangle_symbol(&name);
        Self {
            name,
            demangled_name,
            address,
            size,
        }
    }

    /// シンボルが占めるアドレス範囲の終端（この値は含まない）
    pub fn end_address(&self) -> u64 {
        self.address.saturating_add(self.size)
    }
}

/// シンボル名をデマングルする
fn demangle_symbol(name: &str) -> String {
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        return format!("{:#}", demangled);
    }

    // Go や C のシンボルはそのまま
    name.to_string()
}

/// シンボル解決
pub struct SymbolResolver<'a> {
    symbols: &'a [Symbol],
}

impl<'a> SymbolResolver<'a> {
    /// DWARFローダーからシンボル解決を作成する
    pub fn new(loader: &'a DwarfLoader) -> Self {
        Self::from_symbols(loader.symbols())
    }

    /// シンボルのスライスから直接作成する
    pub fn from_symbols(symbols: &'a [Symbol]) -> Self {
        Self { symbols }
    }

    /// 関数名に一致するシンボルを探す
    ///
    /// まずマングル名の完全一致を探し、見つからなければデマングル名で探す。
    /// 同名のシンボルが複数あっても曖昧さは解決せず、最初に見つかったものを返す。
    pub fn find_function(&self, name: &str) -> Option<&'a Symbol> {
        self.symbols
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.symbols.iter().find(|s| s.demangled_name == name))
    }

    /// パターンにマッチするシンボルを検索する
    /// マングル名とデマングル名の両方で検索する
    pub fn find_symbols(&self, pattern: &str) -> Vec<&'a Symbol> {
        self.symbols
            .iter()
            .filter(|s| s.name.contains(pattern) || s.demangled_name.contains(pattern))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_symbols() -> Vec<Symbol> {
        vec![
            Symbol::new("main.main".to_string(), 0x47dbe0, 0x60),
            Symbol::new("main.ABC".to_string(), 0x47dc40, 0x80),
            Symbol::new("main.ABC".to_string(), 0x47dd00, 0x10),
            Symbol::new(
                "_ZN4demo6helper17h0123456789abcdefE".to_string(),
                0x401000,
                0x20,
            ),
        ]
    }

    #[test]
    fn test_find_function_exact_name() {
        let symbols = sample_symbols();
        let resolver = SymbolResolver::from_symbols(&symbols);

        let sym = resolver.find_function("main.ABC").unwrap();
        // 同名シンボルは最初のものが勝つ
        assert_eq!(sym.address, 0x47dc40);
        assert_eq!(sym.end_address(), 0x47dcc0);
    }

    #[test]
    fn test_find_function_demangled_name() {
        let symbols = sample_symbols();
        let resolver = SymbolResolver::from_symbols(&symbols);

        let sym = resolver.find_function("demo::helper").unwrap();
        assert_eq!(sym.name, "_ZN4demo6helper17h0123456789abcdefE");
        assert_eq!(sym.address, 0x401000);
    }

    #[test]
    fn test_find_function_missing() {
        let symbols = sample_symbols();
        let resolver = SymbolResolver::from_symbols(&symbols);

        assert!(resolver.find_function("main.NotThere").is_none());
        assert!(resolver.find_function("main").is_none());
    }

    #[test]
    fn test_find_symbols_pattern() {
        let symbols = sample_symbols();
        let resolver = SymbolResolver::from_symbols(&symbols);

        assert_eq!(resolver.find_symbols("main.").len(), 3);
        assert_eq!(resolver.find_symbols("helper").len(), 1);
    }
}
