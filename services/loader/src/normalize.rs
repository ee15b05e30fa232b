//! Record normalizers: one nested JSON record in, one flat `Record` out.
//!
//! Normalizers never fail. Missing sub-objects read as empty, bad scalars
//! coerce to typed nulls, and `None` is returned only when the record is not
//! an object, is empty, or has no usable key.

use serde_json::{Map, Value};

use crate::coerce::{bool_or_none, float_or_none, int_or_none, text_or_none, timestamp_or_none};
use crate::record::Record;

/// Read-only view over a JSON object that tolerates absence at every level.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a>(Option<&'a Map<String, Value>>);

impl<'a> Fields<'a> {
    pub fn of(value: &'a Value) -> Self {
        Self(value.as_object())
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.and_then(|m| m.get(key))
    }

    /// Nested object, or an empty view when absent or not an object.
    pub fn sub(&self, key: &str) -> Fields<'a> {
        Fields(self.get(key).and_then(Value::as_object))
    }

    pub fn is_empty(&self) -> bool {
        self.0.map_or(true, Map::is_empty)
    }

    fn int(&self, key: &str) -> Option<i64> {
        int_or_none(self.get(key))
    }

    fn float(&self, key: &str) -> Option<f64> {
        float_or_none(self.get(key))
    }

    fn boolean(&self, key: &str) -> Option<bool> {
        bool_or_none(self.get(key))
    }

    fn text(&self, key: &str) -> Option<String> {
        text_or_none(self.get(key))
    }

    fn ts(&self, key: &str) -> Option<chrono::NaiveDateTime> {
        timestamp_or_none(self.get(key))
    }
}

/// Non-empty object with an integer `id`.
fn keyed(raw: &Value) -> Option<(Fields<'_>, i64)> {
    let f = Fields::of(raw);
    if f.is_empty() {
        return None;
    }
    let id = f.int("id")?;
    Some((f, id))
}

pub fn municipio(raw: &Value) -> Option<Record> {
    let f = Fields::of(raw);
    let codigo_siafi = f.int("codigoSIAFI")?;
    let estado = f.sub("estado");
    Some(
        Record::new()
            .int("id", f.int("id"))
            .text("nome", f.text("nome"))
            .int("codigo_siafi", Some(codigo_siafi))
            .int("codigo_ibge", f.int("codigoIBGE"))
            .int("estado_id", estado.int("id"))
            .text("estado_nome", estado.text("nome"))
            .text("estado_uf", estado.text("uf"))
            .int("estado_codigo_ibge", estado.int("codigoIbge")),
    )
}

pub fn bairro(raw: &Value) -> Option<Record> {
    let (f, id) = keyed(raw)?;
    Some(
        Record::new()
            .int("id", Some(id))
            .int("codigo", f.int("codigo"))
            .text("nome", f.text("nome"))
            .int("municipio_codigo_siafi", f.sub("municipio").int("codigoSIAFI"))
            .text("zona_rural_descricao", f.sub("zonaRural").text("descricao")),
    )
}

pub fn condominio(raw: &Value) -> Option<Record> {
    let (f, id) = keyed(raw)?;
    let tipo = f.sub("tipoCondominio");
    Some(
        Record::new()
            .int("id", Some(id))
            .int("codigo", f.int("codigo"))
            .text("nome", f.text("nome"))
            .text("tipo_condominio_valor", tipo.text("valor"))
            .text("tipo_condominio_descricao", tipo.text("descricao")),
    )
}

pub fn distrito(raw: &Value) -> Option<Record> {
    let (f, id) = keyed(raw)?;
    Some(
        Record::new()
            .int("id", Some(id))
            .text("nome", f.text("nome"))
            .int("codigo", f.int("codigo"))
            .int("municipio_codigo_siafi", f.sub("municipio").int("codigoSIAFI")),
    )
}

pub fn logradouro(raw: &Value) -> Option<Record> {
    let (f, id) = keyed(raw)?;
    Some(
        Record::new()
            .int("id", Some(id))
            .int("codigo", f.int("codigo"))
            .text("nome", f.text("nome"))
            .text("tipo_logradouro_descricao", f.text("tipoLogradouroDescricao"))
            .text("tipo_logradouro_abreviatura", f.text("tipoLogradouroAbreviatura"))
            .text("cep", f.text("cep"))
            .float("extensao", f.float("extensao"))
            .text("lei", f.text("lei"))
            .text("zona_fiscal", f.text("zonaFiscal"))
            .int("municipio_codigo_siafi", f.sub("municipio").int("codigoSIAFI"))
            .text("denominacao_anterior", f.text("denominacaoAnterior"))
            .float("latitude", f.float("latitude"))
            .float("longitude", f.float("longitude")),
    )
}

pub fn loteamento(raw: &Value) -> Option<Record> {
    let (f, id) = keyed(raw)?;
    Some(
        Record::new()
            .int("id", Some(id))
            .int("codigo", f.int("codigo"))
            .text("nome", f.text("nome"))
            .text("matricula_imobiliaria", f.text("matriculaImobiliaria"))
            .timestamp("dh_registro_imovel", f.ts("dhRegistroImovel"))
            .text("nro_decreto_aprovacao", f.text("nroDecretoAprovacao"))
            .text("nro_processo_aprovacao", f.text("nroProcessoAprovacao"))
            .int("bairro_id", f.sub("bairro").int("id"))
            .int("municipio_codigo_siafi", f.sub("municipio").int("codigoSIAFI")),
    )
}

pub fn imovel(raw: &Value) -> Option<Record> {
    let (f, id) = keyed(raw)?;
    // Single-unit properties come without a unit number (or with 0).
    let unidade = f.int("unidade").filter(|u| *u != 0).unwrap_or(1);
    Some(
        Record::new()
            .int("id", Some(id))
            .int("codigo", f.int("codigo"))
            .int("unidade", Some(unidade))
            .text("tipo_imovel_descricao", f.sub("tipoImovel").text("descricao"))
            .int("id_imovel_principal", f.int("idImovelPrincipal"))
            .text(
                "endereco_correspondencia_descricao",
                f.sub("enderecoCorrespondencia").text("descricao"),
            )
            .boolean("englobado", f.boolean("englobado"))
            .text("inscricao_incra", f.text("inscricaoIncra"))
            .text("inscricao_anterior", f.text("inscricaoAnterior"))
            .text("apartamento", f.text("apartamento"))
            .text("bloco", f.text("bloco"))
            .text("garagem", f.text("garagem"))
            .text("sala", f.text("sala"))
            .text("loja", f.text("loja"))
            .text("cep", f.text("cep"))
            .text("complemento", f.text("complemento"))
            .text("lote", f.text("lote"))
            .text("matricula", f.text("matricula"))
            .text("numero", f.text("numero"))
            .text("quadra", f.text("quadra"))
            .text("setor", f.text("setor"))
            .text("secao", f.text("secao"))
            .text("situacao_descricao", f.sub("situacao").text("descricao"))
            .text(
                "inscricao_imobiliaria_formatada",
                f.text("inscricaoImobiliariaFormatada"),
            )
            .text("endereco_formatado", f.text("enderecoFormatado"))
            .timestamp("dt_construcao", f.ts("dtConstrucao"))
            .timestamp("dh_operacao", f.ts("dhOperacao"))
            .text("created_by", f.text("createdBy"))
            .timestamp("created_in", f.ts("createdIn"))
            .int("id_englobamento", f.int("idEnglobamento"))
            .int("id_imovel_englobado", f.int("idImovelEnglobado"))
            .int("bairro_id", f.sub("bairro").int("id"))
            .int("condominio_id", f.sub("condominio").int("id"))
            .int("distrito_id", f.sub("distrito").int("id"))
            .int("logradouro_id", f.sub("logradouro").int("id"))
            .int("loteamento_id", f.sub("loteamento").int("id")),
    )
}

pub fn pessoa(raw: &Value) -> Option<Record> {
    let (f, id) = keyed(raw)?;
    Some(
        Record::new()
            .int("id", Some(id))
            .int("codigo", f.int("codigo"))
            .text("nome", f.text("nome"))
            .text("nome_sem_espolio", f.text("nomeSemEspolio"))
            .text("cpf_cnpj", f.text("cpfCnpj"))
            .text("inscricao_municipal", f.text("inscricaoMunicipal"))
            .text("nome_fantasia", f.text("nomeFantasia"))
            .boolean("contribuinte_estrangeiro", f.boolean("contribuinteEstrangeiro"))
            .text("site", f.text("site"))
            .text("situacao_valor", f.sub("situacao").text("valor"))
            .text("tipo_pessoa_valor", f.sub("tipoPessoa").text("valor"))
            .text(
                "optante_simples_nacional_valor",
                f.sub("optanteSimplesNacional").text("valor"),
            )
            .text(
                "endereco_principal_formatado",
                f.text("enderecoPrincipalFormatado"),
            )
            .text("created_by", f.text("createdBy"))
            .timestamp("created_in", f.ts("createdIn"))
            .text("email", f.text("email"))
            .text("telefone", f.text("telefone"))
            .timestamp("dh_operacao", f.ts("dhOperacao"))
            .timestamp("dt_obito", f.sub("pessoaFisica").ts("dtObito"))
            .timestamp(
                "dt_emissao_pis_pasep",
                f.sub("pessoaFisicaDocumentos").ts("dtEmissaoPisPasep"),
            )
            .text(
                "natureza_juridica",
                f.sub("pessoaJuridica").text("naturezaJuridica"),
            ),
    )
}

pub fn secao(raw: &Value) -> Option<Record> {
    let (f, id) = keyed(raw)?;
    Some(
        Record::new()
            .int("id", Some(id))
            .int("nro_secao", f.int("nroSecao"))
            .int("logradouro_id", f.sub("logradouro").int("id"))
            .int("face_id", f.sub("face").int("id")),
    )
}

pub fn planta_valor(raw: &Value) -> Option<Record> {
    let (f, id) = keyed(raw)?;
    let valor = f.float("valor").or_else(|| f.float("plantaValor"));
    let referencia = f
        .ts("dataReferencia")
        .or_else(|| f.ts("plantaDataReferencia"));
    Some(
        Record::new()
            .int("id", Some(id))
            .float("valor", valor)
            .timestamp("data_referencia", referencia),
    )
}
