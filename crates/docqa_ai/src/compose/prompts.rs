pub const NO_EVIDENCE_REPLY: &str = "The provided document does not contain information about this question.";

pub fn grounded_answer_prompt(question: &str, context: &str) -> String {
    // Contract:
    // - Answer from the context only.
    // - Fixed reply when the context does not hold the answer.
    format!(
        r#"You are a question-answering assistant. Answer the question using only the retrieved context below.
If the context does not contain the answer, reply exactly: "{NO_EVIDENCE_REPLY}"
Answer only what is relevant to the question and do not speculate. Keep technical terms and names untranslated.

#Question:
{question}

#Context:
{context}

#Answer:"#
    )
}

pub fn no_evidence_prompt(question: &str) -> String {
    format!(
        r#"You are a question-answering assistant. A search of the provided document found no passages relevant to the question below.
Tell the user that no relevant information was found in the provided document, in one or two sentences. Do not answer from general knowledge and do not speculate.

#Question:
{question}

#Context:
(no relevant passages were found)

#Answer:"#
    )
}
